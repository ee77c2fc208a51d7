//! C3.4: the State Verifying Sequence (spec §4.3.4).
//!
//! Best-first search over `(candidate set, current position of each
//! candidate)`, following only the branch that still contains the
//! target state — every other branch is a don't-care, since an SVS
//! only has to confirm *this* state, not separate the rest of the
//! machine. A solution exists iff the candidate set collapses to
//! `{target}`; the result is `None` if no input sequence ever does.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use fsm_core::collections::{Map, Set};
use fsm_core::{Input, KindDescriptor, Output, StateId, STOUT_INPUT};
use tracing::debug;

use crate::Dfsm;

use super::pds::MAX_CLOSED;

#[derive(Clone)]
struct SearchNode {
    seq: Vec<Input>,
    /// Original states still consistent with every observation made so far.
    candidates: Vec<StateId>,
    /// `cur[i]` — current actual position of `candidates[i]`.
    cur: Vec<StateId>,
}

fn canonical_key(node: &SearchNode) -> Vec<u32> {
    let mut pairs: Vec<(StateId, StateId)> = node.candidates.iter().copied().zip(node.cur.iter().copied()).collect();
    pairs.sort_unstable();
    let mut key = Vec::with_capacity(pairs.len() * 2);
    for (c, p) in pairs {
        key.push(c);
        key.push(p);
    }
    key
}

fn heuristic(node: &SearchNode) -> u32 {
    let bits = 32 - (node.candidates.len() as u32).max(1).leading_zeros();
    super::pds::PDS_HEURISTIC_WEIGHT * bits + node.seq.len() as u32
}

impl Eq for SearchNode {}
impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.seq.len() == other.seq.len()
    }
}
impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.seq.len().cmp(&other.seq.len())
    }
}
impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Computes a shortest sequence that verifies `target`: applying it
/// against a black box, no matter which state the black box is
/// actually in, yields an output distinct from `target`'s own unless
/// the black box really is in `target` (spec §4.3.4). `None` if no
/// such sequence exists.
///
/// # Example
/// ```
/// use fsm::Dfsm;
/// use fsm::sequence::svs::get_state_verifying_sequence;
/// use fsm_core::MachineKind;
///
/// let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
/// m.set_transition(0, 0, 0, Some(0)).unwrap();
/// m.set_transition(0, 1, 1, Some(0)).unwrap();
/// m.set_transition(1, 0, 0, Some(0)).unwrap();
/// m.set_transition(1, 1, 1, Some(1)).unwrap();
/// assert_eq!(get_state_verifying_sequence(&m, 0), Some(vec![1]));
/// ```
pub fn get_state_verifying_sequence(m: &Dfsm, target: StateId) -> Option<Vec<Input>> {
    let begins_with_stout = m.kind().is_output_state();
    let initial: Vec<StateId> = if begins_with_stout {
        m.states()
            .filter(|&s| m.get_state_output(s) == m.get_state_output(target))
            .collect()
    } else {
        m.states().collect()
    };

    if initial.len() <= 1 {
        return Some(if begins_with_stout { vec![STOUT_INPUT] } else { Vec::new() });
    }

    let start = SearchNode {
        seq: Vec::new(),
        cur: initial.clone(),
        candidates: initial,
    };

    let mut heap = BinaryHeap::new();
    heap.push(Reverse((heuristic(&start), start)));
    let mut closed: Set<Vec<u32>> = Set::new();
    let mut expansions = 0usize;

    while let Some(Reverse((_, node))) = heap.pop() {
        let key = canonical_key(&node);
        if !closed.insert(key) {
            continue;
        }
        expansions += 1;
        if expansions > MAX_CLOSED {
            debug!(target, expansions, "SVS search gave up at MAX_CLOSED");
            return None;
        }

        for a in m.inputs() {
            let mut by_signal: Map<(Output, Output), Vec<(StateId, StateId)>> = Map::new();
            for (&orig, &cur) in node.candidates.iter().zip(node.cur.iter()) {
                let next = m.get_next_state(cur, a);
                let reached_output = if begins_with_stout {
                    m.get_state_output(next)
                } else {
                    fsm_core::DEFAULT_OUTPUT
                };
                by_signal
                    .entry((m.get_output(cur, a), reached_output))
                    .or_default()
                    .push((orig, next));
            }

            let Some(group) = by_signal.values().find(|g| g.iter().any(|&(o, _)| o == target)) else {
                continue;
            };

            let mut seen_cur: Set<StateId> = Set::new();
            if !group.iter().all(|&(_, c)| seen_cur.insert(c)) {
                // Two survivors collapsed onto the same physical state:
                // permanently stuck together, this branch is dead.
                continue;
            }

            let mut new_seq = node.seq.clone();
            new_seq.push(a);
            if begins_with_stout {
                new_seq.push(STOUT_INPUT);
            }

            if group.len() == 1 {
                return Some(new_seq);
            }

            let child = SearchNode {
                seq: new_seq,
                candidates: group.iter().map(|&(o, _)| o).collect(),
                cur: group.iter().map(|&(_, c)| c).collect(),
            };
            heap.push(Reverse((heuristic(&child), child)));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineKind;

    #[test]
    fn mealy_two_state_svs() {
        let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
        m.set_transition(0, 0, 0, Some(0)).unwrap();
        m.set_transition(0, 1, 1, Some(0)).unwrap();
        m.set_transition(1, 0, 0, Some(0)).unwrap();
        m.set_transition(1, 1, 1, Some(1)).unwrap();
        for s in m.states() {
            let svs = get_state_verifying_sequence(&m, s).unwrap();
            assert_ne!(
                m.get_output_along_path(s, &svs),
                m.get_output_along_path(1 - s, &svs)
            );
        }
    }

    #[test]
    fn moore_svs_verifies_target() {
        let mut m = Dfsm::create(3, 2, 2, MachineKind::Moore);
        m.set_output(0, 0, None).unwrap();
        m.set_output(1, 0, None).unwrap();
        m.set_output(2, 1, None).unwrap();
        m.set_transition(0, 0, 1, None).unwrap();
        m.set_transition(0, 1, 0, None).unwrap();
        m.set_transition(1, 0, 2, None).unwrap();
        m.set_transition(1, 1, 1, None).unwrap();
        m.set_transition(2, 0, 2, None).unwrap();
        m.set_transition(2, 1, 0, None).unwrap();
        for s in m.states() {
            let svs = get_state_verifying_sequence(&m, s).unwrap();
            for other in m.states().filter(|&o| o != s) {
                assert_ne!(
                    m.get_output_along_path(s, &svs),
                    m.get_output_along_path(other, &svs)
                );
            }
        }
    }
}
