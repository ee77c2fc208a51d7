use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use fsm::Dfsm;
use fsm_core::{FsmError, Input, MachineKind, Output};

use super::BlackBox;

struct Position {
    node: usize,
    path: Vec<Input>,
    /// Whether the wrapped box's real position actually matches `path`
    /// right now. Stays `true` across consecutive cache misses (each
    /// one drove the inner box forward one more step); goes `false` the
    /// moment a query is served from the memo alone, since that step
    /// never touched the inner box.
    synced: bool,
}

/// Wraps an opaque [`BlackBox`] and memoizes every observed `(prefix,
/// output)` pair in a response tree (spec §4.5 "tree-cached"). A query
/// along an already-fully-cached path never touches the inner box; the
/// first cache miss after a run of hits pays for one resync (a reset
/// plus a replay of the accumulated path) before the new symbol is
/// actually queried.
pub struct TreeCachedBlackBox<B: BlackBox> {
    inner: B,
    /// `memo[node][input] = (output, child)`; node 0 is the root.
    memo: Mutex<Vec<HashMap<Input, (Output, usize)>>>,
    position: Mutex<Position>,
    queried_symbols: AtomicU64,
    resets: AtomicU64,
}

impl<B: BlackBox> TreeCachedBlackBox<B> {
    pub fn new(inner: B) -> Self {
        TreeCachedBlackBox {
            inner,
            memo: Mutex::new(vec![HashMap::new()]),
            position: Mutex::new(Position { node: 0, path: Vec::new(), synced: false }),
            queried_symbols: AtomicU64::new(0),
            resets: AtomicU64::new(0),
        }
    }
}

impl<B: BlackBox> BlackBox for TreeCachedBlackBox<B> {
    fn num_inputs(&self) -> u32 {
        self.inner.num_inputs()
    }

    fn num_outputs(&self) -> u32 {
        self.inner.num_outputs()
    }

    fn model_kind(&self) -> MachineKind {
        self.inner.model_kind()
    }

    fn is_resettable(&self) -> bool {
        self.inner.is_resettable()
    }

    fn reset(&self) -> Result<(), FsmError> {
        if !self.inner.is_resettable() {
            return Err(FsmError::BlackBoxNotResettable);
        }
        let mut pos = self.position.lock().unwrap();
        pos.node = 0;
        pos.path.clear();
        // The inner box hasn't actually been touched yet (that's the
        // whole point); the next real query must resync it first.
        pos.synced = false;
        Ok(())
    }

    fn query(&self, input: Input) -> Output {
        let mut memo = self.memo.lock().unwrap();
        let mut pos = self.position.lock().unwrap();

        if let Some(&(out, child)) = memo[pos.node].get(&input) {
            pos.node = child;
            pos.path.push(input);
            pos.synced = false;
            return out;
        }

        if !pos.synced {
            self.inner.reset().expect("reset already validated resettable");
            self.resets.fetch_add(1, Ordering::Relaxed);
            if !pos.path.is_empty() {
                self.inner.query_seq(&pos.path);
                self.queried_symbols
                    .fetch_add(pos.path.len() as u64, Ordering::Relaxed);
            }
        }

        let out = self.inner.query(input);
        self.queried_symbols.fetch_add(1, Ordering::Relaxed);

        let new_node = memo.len();
        memo.push(HashMap::new());
        memo[pos.node].insert(input, (out, new_node));
        pos.node = new_node;
        pos.path.push(input);
        pos.synced = true;
        out
    }

    fn queried_symbols_count(&self) -> u64 {
        self.queried_symbols.load(Ordering::Relaxed)
    }

    fn applied_reset_count(&self) -> u64 {
        self.resets.load(Ordering::Relaxed)
    }

    fn reference_model(&self) -> Option<&Dfsm> {
        self.inner.reference_model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackbox::ModelBackedBlackBox;
    use fsm_core::MachineKind;
    use std::sync::atomic::Ordering;

    fn two_state_mealy() -> Dfsm {
        let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
        m.set_transition(0, 0, 0, Some(0)).unwrap();
        m.set_transition(0, 1, 1, Some(0)).unwrap();
        m.set_transition(1, 0, 0, Some(0)).unwrap();
        m.set_transition(1, 1, 1, Some(1)).unwrap();
        m
    }

    #[test]
    fn repeated_prefix_avoids_a_second_reset() {
        let bb = TreeCachedBlackBox::new(ModelBackedBlackBox::new(two_state_mealy()));
        bb.reset().unwrap();
        assert_eq!(bb.query_seq(&[1, 1]), vec![0, 1]);
        let resets_after_first = bb.resets.load(Ordering::Relaxed);
        let symbols_after_first = bb.queried_symbols_count();

        bb.reset().unwrap();
        assert_eq!(bb.query_seq(&[1, 1]), vec![0, 1]);
        assert_eq!(bb.resets.load(Ordering::Relaxed), resets_after_first);
        assert_eq!(bb.queried_symbols_count(), symbols_after_first);
    }

    #[test]
    fn diverging_continuation_resyncs_once() {
        let bb = TreeCachedBlackBox::new(ModelBackedBlackBox::new(two_state_mealy()));
        bb.reset().unwrap();
        assert_eq!(bb.query_seq(&[1]), vec![0]);
        bb.reset().unwrap();
        // same prefix [1] cached, then a fresh symbol [0] forces one resync
        assert_eq!(bb.query_seq(&[1, 0]), vec![0, 0]);
        assert_eq!(bb.resets.load(Ordering::Relaxed), 2);
    }
}
