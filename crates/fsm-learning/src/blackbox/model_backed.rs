use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use fsm::Dfsm;
use fsm_core::{FsmError, Input, MachineKind, Output, NULL_STATE, STOUT_INPUT};

use super::BlackBox;

/// Wraps a reference [`Dfsm`]: queries walk its transition table
/// directly (spec §4.5 "model-backed"). Always resettable.
pub struct ModelBackedBlackBox {
    model: Dfsm,
    cur: Mutex<fsm_core::StateId>,
    queried_symbols: AtomicU64,
    resets: AtomicU64,
}

impl ModelBackedBlackBox {
    pub fn new(model: Dfsm) -> Self {
        ModelBackedBlackBox {
            model,
            cur: Mutex::new(0),
            queried_symbols: AtomicU64::new(0),
            resets: AtomicU64::new(0),
        }
    }
}

impl BlackBox for ModelBackedBlackBox {
    fn num_inputs(&self) -> u32 {
        self.model.num_inputs()
    }

    fn num_outputs(&self) -> u32 {
        self.model.num_outputs()
    }

    fn model_kind(&self) -> MachineKind {
        self.model.kind()
    }

    fn is_resettable(&self) -> bool {
        true
    }

    fn reset(&self) -> Result<(), FsmError> {
        *self.cur.lock().unwrap() = 0;
        self.resets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn query(&self, input: Input) -> Output {
        let mut cur = self.cur.lock().unwrap();
        let out = self.model.get_output(*cur, input);
        *cur = self.model.get_next_state(*cur, input);
        if input != STOUT_INPUT {
            self.queried_symbols.fetch_add(1, Ordering::Relaxed);
        }
        out
    }

    fn queried_symbols_count(&self) -> u64 {
        self.queried_symbols.load(Ordering::Relaxed)
    }

    fn applied_reset_count(&self) -> u64 {
        self.resets.load(Ordering::Relaxed)
    }

    fn reference_model(&self) -> Option<&Dfsm> {
        Some(&self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineKind;

    fn two_state_mealy() -> Dfsm {
        let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
        m.set_transition(0, 0, 0, Some(0)).unwrap();
        m.set_transition(0, 1, 1, Some(0)).unwrap();
        m.set_transition(1, 0, 0, Some(0)).unwrap();
        m.set_transition(1, 1, 1, Some(1)).unwrap();
        m
    }

    #[test]
    fn walks_the_transition_table() {
        let bb = ModelBackedBlackBox::new(two_state_mealy());
        let out = bb.reset_and_query(&[1, 1]).unwrap();
        assert_eq!(out, vec![0, 1]);
        assert_eq!(bb.queried_symbols_count(), 2);
        assert_eq!(bb.applied_reset_count(), 1);
    }

    #[test]
    fn absent_transition_reports_null_state_onward() {
        // state 0 has no outgoing edge on input 0
        let m = Dfsm::create(1, 1, 1, MachineKind::Mealy);
        let bb = ModelBackedBlackBox::new(m);
        bb.reset().unwrap();
        let out = bb.query(0);
        assert_eq!(out, fsm_core::DEFAULT_OUTPUT);
        assert_eq!(*bb.cur.lock().unwrap(), NULL_STATE);
    }
}
