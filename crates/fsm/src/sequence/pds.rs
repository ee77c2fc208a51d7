//! C3.3 (preset half): the Preset Distinguishing Sequence search
//! (spec §4.3.3).

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use itertools::Itertools;
use tracing::debug;

use fsm_core::collections::{Map, Set};
use fsm_core::{Input, KindDescriptor, Output, StateId, STOUT_INPUT};

use crate::Dfsm;

/// Weight of the block-separator estimate in the PDS search heuristic
/// (spec §9: "the precise priority weight 4 is arbitrary; treat as a
/// tunable constant").
pub const PDS_HEURISTIC_WEIGHT: u32 = 4;

/// Cap on the number of distinct (partition, current-state) search
/// nodes the PDS search will expand before giving up (spec §4.3.3
/// "capped by a global MAX_CLOSED").
pub const MAX_CLOSED: usize = 200_000;

#[derive(Clone, Eq, PartialEq)]
struct SearchNode {
    seq: Vec<Input>,
    /// `blocks[b]` = original states still grouped together.
    blocks: Vec<Vec<StateId>>,
    /// `cur[s]` = the actual state original state `s` is in now.
    cur: Vec<StateId>,
}

fn canonical_key(node: &SearchNode) -> Vec<u32> {
    let blocks = node
        .blocks
        .iter()
        .cloned()
        .map(|mut b| {
            b.sort_unstable();
            b
        })
        .sorted()
        .collect_vec();
    let mut key: Vec<u32> = blocks.into_iter().flatten().collect();
    key.push(u32::MAX);
    key.extend_from_slice(&node.cur);
    key
}

fn heuristic(node: &SearchNode) -> u32 {
    let max_block = node.blocks.iter().map(|b| b.len()).max().unwrap_or(1) as u32;
    let bits = 32 - max_block.max(1).leading_zeros();
    PDS_HEURISTIC_WEIGHT * bits + node.seq.len() as u32
}

/// Computes a shortest preset distinguishing sequence for `m`, or
/// `None` if none exists (spec §8 scenario 2 is such a case).
///
/// # Example
/// ```
/// use fsm::Dfsm;
/// use fsm::sequence::pds::get_preset_distinguishing_sequence;
/// use fsm_core::MachineKind;
///
/// let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
/// m.set_transition(0, 0, 0, Some(0)).unwrap();
/// m.set_transition(0, 1, 1, Some(0)).unwrap();
/// m.set_transition(1, 0, 0, Some(0)).unwrap();
/// m.set_transition(1, 1, 1, Some(1)).unwrap();
/// assert_eq!(get_preset_distinguishing_sequence(&m, true), Some(vec![1]));
/// ```
pub fn get_preset_distinguishing_sequence(m: &Dfsm, omit_unnecessary_stout_inputs: bool) -> Option<Vec<Input>> {
    let n = m.num_states();
    if n == 0 {
        return Some(Vec::new());
    }

    let mut begins_with_stout = false;
    let initial_blocks: Vec<Vec<StateId>> = if m.kind().is_output_state() {
        begins_with_stout = true;
        let mut groups: Map<u32, Vec<StateId>> = Map::new();
        for s in m.states() {
            groups.entry(m.get_state_output(s)).or_default().push(s);
        }
        groups.into_values().collect()
    } else {
        vec![(0..n).collect()]
    };

    if initial_blocks.iter().all(|b| b.len() <= 1) {
        return Some(if begins_with_stout { vec![STOUT_INPUT] } else { Vec::new() });
    }

    let start = SearchNode {
        seq: Vec::new(),
        blocks: initial_blocks,
        cur: (0..n).collect(),
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
            debug!(states = n, expansions, "PDS search gave up at MAX_CLOSED");
            return None;
        }

        for a in m.inputs() {
            let mut collapses = false;
            'outer: for block in &node.blocks {
                for w in 0..block.len() {
                    for v in (w + 1)..block.len() {
                        let (s1, s2) = (block[w], block[v]);
                        let c1 = node.cur[s1 as usize];
                        let c2 = node.cur[s2 as usize];
                        if m.get_output(c1, a) == m.get_output(c2, a)
                            && m.get_next_state(c1, a) == m.get_next_state(c2, a)
                        {
                            collapses = true;
                            break 'outer;
                        }
                    }
                }
            }
            if collapses {
                continue;
            }

            // The observable signal after applying `a` is the transition
            // output where the kind carries one, plus the *reached*
            // state's own output where the kind carries that instead
            // (Moore/DFA transitions carry no output of their own, so
            // grouping on transition output alone would never progress
            // past the initial state-output partition for those kinds).
            let mut new_cur = node.cur.clone();
            let mut new_blocks: Vec<Vec<StateId>> = Vec::new();
            for block in &node.blocks {
                let mut by_out: Map<(Output, Output), Vec<StateId>> = Map::new();
                for &s in block {
                    let c = node.cur[s as usize];
                    let next = m.get_next_state(c, a);
                    new_cur[s as usize] = next;
                    let reached_output = if m.kind().is_output_state() {
                        m.get_state_output(next)
                    } else {
                        fsm_core::DEFAULT_OUTPUT
                    };
                    by_out
                        .entry((m.get_output(c, a), reached_output))
                        .or_default()
                        .push(s);
                }
                new_blocks.extend(by_out.into_values());
            }

            let mut new_seq = node.seq.clone();
            new_seq.push(a);
            if !omit_unnecessary_stout_inputs && m.kind().is_output_state() {
                new_seq.push(STOUT_INPUT);
            }

            let child = SearchNode {
                seq: new_seq,
                blocks: new_blocks,
                cur: new_cur,
            };

            if child.blocks.iter().all(|b| b.len() <= 1) {
                let mut result = Vec::new();
                if begins_with_stout {
                    result.push(STOUT_INPUT);
                }
                result.extend(child.seq);
                debug!(len = result.len(), expansions, "PDS found");
                return Some(result);
            }
            heap.push(Reverse((heuristic(&child), child)));
        }
    }
    None
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

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineKind;

    #[test]
    fn two_state_mealy_has_pds() {
        let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
        m.set_transition(0, 0, 0, Some(0)).unwrap();
        m.set_transition(0, 1, 1, Some(0)).unwrap();
        m.set_transition(1, 0, 0, Some(0)).unwrap();
        m.set_transition(1, 1, 1, Some(1)).unwrap();
        assert_eq!(get_preset_distinguishing_sequence(&m, true), Some(vec![1]));
    }

    #[test]
    fn moore_without_pds_returns_none() {
        let mut m = Dfsm::create(3, 2, 2, MachineKind::Moore);
        m.set_output(0, 0, None).unwrap();
        m.set_output(1, 0, None).unwrap();
        m.set_output(2, 1, None).unwrap();
        m.set_transition(0, 0, 1, None).unwrap();
        m.set_transition(0, 1, 2, None).unwrap();
        m.set_transition(1, 0, 0, None).unwrap();
        m.set_transition(1, 1, 2, None).unwrap();
        m.set_transition(2, 0, 2, None).unwrap();
        m.set_transition(2, 1, 1, None).unwrap();
        assert_eq!(get_preset_distinguishing_sequence(&m, false), None);
    }
}
