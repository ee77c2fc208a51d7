//! C3.5: synchronizing and preset homing sequences (spec §4.3.5), both
//! found via BFS/best-first search over state-possibility sets.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use fsm_core::{Input, KindDescriptor, Output, StateId};
use tracing::debug;

use crate::Dfsm;

use super::pds::{MAX_CLOSED, PDS_HEURISTIC_WEIGHT};

/// A sequence that drives every state to the same state, regardless of
/// where the machine started (spec §4.3.5). `None` if `m` has no
/// synchronizing sequence (true of any machine with an unreachable
/// state, among others).
///
/// # Example
/// ```
/// use fsm::Dfsm;
/// use fsm::sequence::sync_homing::get_synchronizing_sequence;
/// use fsm_core::MachineKind;
///
/// let mut m = Dfsm::create(3, 2, 2, MachineKind::Mealy);
/// m.set_transition(0, 0, 1, Some(0)).unwrap();
/// m.set_transition(1, 0, 2, Some(0)).unwrap();
/// m.set_transition(2, 0, 2, Some(0)).unwrap();
/// m.set_transition(0, 1, 0, Some(0)).unwrap();
/// m.set_transition(1, 1, 1, Some(0)).unwrap();
/// m.set_transition(2, 1, 2, Some(0)).unwrap();
/// let sync = get_synchronizing_sequence(&m).unwrap();
/// let ends: std::collections::HashSet<_> = m.states().map(|s| m.get_end_path_state(s, &sync)).collect();
/// assert_eq!(ends.len(), 1);
/// ```
pub fn get_synchronizing_sequence(m: &Dfsm) -> Option<Vec<Input>> {
    let n = m.num_states();
    if n == 0 {
        return Some(Vec::new());
    }
    let start: Vec<StateId> = (0..n).collect();
    if start.len() <= 1 {
        return Some(Vec::new());
    }

    let mut queue = VecDeque::new();
    let mut visited: HashSet<Vec<StateId>> = HashSet::new();
    visited.insert(start.clone());
    queue.push_back((start, Vec::new()));
    let mut expansions = 0usize;

    while let Some((set, seq)) = queue.pop_front() {
        expansions += 1;
        if expansions > MAX_CLOSED {
            debug!(states = n, expansions, "synchronizing-sequence search gave up at MAX_CLOSED");
            return None;
        }
        for a in m.inputs() {
            let mut image: Vec<StateId> = set.iter().map(|&s| m.get_next_state(s, a)).collect();
            image.sort_unstable();
            image.dedup();
            if image.len() == 1 {
                let mut result = seq.clone();
                result.push(a);
                return Some(result);
            }
            if image.len() < set.len() && visited.insert(image.clone()) {
                let mut next_seq = seq.clone();
                next_seq.push(a);
                queue.push_back((image, next_seq));
            }
        }
    }
    None
}

#[derive(Clone)]
struct HomingNode {
    seq: Vec<Input>,
    blocks: Vec<Vec<StateId>>,
    cur: Vec<StateId>,
}

fn canonical_key(node: &HomingNode) -> Vec<u32> {
    let mut blocks = node.blocks.clone();
    for b in &mut blocks {
        b.sort_unstable();
    }
    blocks.sort();
    let mut key: Vec<u32> = blocks.into_iter().flatten().collect();
    key.push(u32::MAX);
    key.extend_from_slice(&node.cur);
    key
}

fn heuristic(node: &HomingNode) -> u32 {
    let unresolved = node
        .blocks
        .iter()
        .filter(|b| !b.iter().all(|&s| node.cur[s as usize] == node.cur[b[0] as usize]))
        .count() as u32;
    PDS_HEURISTIC_WEIGHT * unresolved + node.seq.len() as u32
}

fn is_homed(node: &HomingNode) -> bool {
    node.blocks
        .iter()
        .all(|b| b.iter().all(|&s| node.cur[s as usize] == node.cur[b[0] as usize]))
}

impl Eq for HomingNode {}
impl PartialEq for HomingNode {
    fn eq(&self, other: &Self) -> bool {
        self.seq.len() == other.seq.len()
    }
}
impl Ord for HomingNode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.seq.len().cmp(&other.seq.len())
    }
}
impl PartialOrd for HomingNode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A preset sequence after which the output observed determines the
/// machine's resulting state uniquely — weaker than a PDS, since
/// states that started apart are allowed to converge onto one actual
/// state as long as every state producing a given output lands on the
/// *same* actual state (spec §4.3.5). `None` if none exists.
pub fn get_homing_sequence(m: &Dfsm) -> Option<Vec<Input>> {
    let n = m.num_states();
    if n == 0 {
        return Some(Vec::new());
    }

    let initial_blocks: Vec<Vec<StateId>> = if m.kind().is_output_state() {
        let mut groups: HashMap<Output, Vec<StateId>> = HashMap::new();
        for s in m.states() {
            groups.entry(m.get_state_output(s)).or_default().push(s);
        }
        groups.into_values().collect()
    } else {
        vec![(0..n).collect()]
    };

    let start = HomingNode {
        seq: Vec::new(),
        blocks: initial_blocks,
        cur: (0..n).collect(),
    };
    if is_homed(&start) {
        return Some(start.seq);
    }

    let mut heap = BinaryHeap::new();
    heap.push(Reverse((heuristic(&start), start)));
    let mut closed: HashSet<Vec<u32>> = HashSet::new();
    let mut expansions = 0usize;

    while let Some(Reverse((_, node))) = heap.pop() {
        let key = canonical_key(&node);
        if !closed.insert(key) {
            continue;
        }
        expansions += 1;
        if expansions > MAX_CLOSED {
            debug!(states = n, expansions, "homing-sequence search gave up at MAX_CLOSED");
            return None;
        }

        for a in m.inputs() {
            let mut new_cur = node.cur.clone();
            let mut new_blocks: Vec<Vec<StateId>> = Vec::new();
            for block in &node.blocks {
                let mut by_out: HashMap<Output, Vec<StateId>> = HashMap::new();
                for &s in block {
                    let c = node.cur[s as usize];
                    new_cur[s as usize] = m.get_next_state(c, a);
                    by_out.entry(m.get_output(c, a)).or_default().push(s);
                }
                new_blocks.extend(by_out.into_values());
            }

            let mut new_seq = node.seq.clone();
            new_seq.push(a);
            let child = HomingNode {
                seq: new_seq,
                blocks: new_blocks,
                cur: new_cur,
            };

            if is_homed(&child) {
                return Some(child.seq);
            }
            heap.push(Reverse((heuristic(&child), child)));
        }
    }
    None
}
