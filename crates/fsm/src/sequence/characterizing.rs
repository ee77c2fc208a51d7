//! C3.7 (spec §4.3.7): the characterizing set and per-state
//! identification sets (HSI), the two "W"-like ingredients of the
//! test-suite generators.

use fsm_core::{Input, StateId};

use crate::Dfsm;

use super::pair_index::all_pairs;
use super::separating::shortest_separating_sequences;
use super::splitting_tree::SplittingTree;

/// A single set of sequences such that every pair of states is
/// distinguished by at least one member — the union of every pairwise
/// shortest separator, deduplicated (spec §4.3.7 "W").
///
/// # Example
/// ```
/// use fsm::Dfsm;
/// use fsm::sequence::characterizing::get_characterizing_set;
/// use fsm_core::MachineKind;
///
/// let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
/// m.set_transition(0, 0, 0, Some(0)).unwrap();
/// m.set_transition(0, 1, 1, Some(0)).unwrap();
/// m.set_transition(1, 0, 0, Some(0)).unwrap();
/// m.set_transition(1, 1, 1, Some(1)).unwrap();
/// let w = get_characterizing_set(&m);
/// assert!(w.iter().any(|seq| m.get_output_along_path(0, seq) != m.get_output_along_path(1, seq)));
/// ```
pub fn get_characterizing_set(m: &Dfsm) -> Vec<Vec<Input>> {
    let pairwise = shortest_separating_sequences(m, true);
    let mut w: Vec<Vec<Input>> = Vec::new();
    for (i, j) in all_pairs(m.num_states()) {
        let sep = &pairwise[super::pair_index::idx(i, j)];
        if !sep.is_empty() && !w.contains(sep) {
            w.push(sep.clone());
        }
    }
    w
}

/// Harmonized state identifiers: a per-state identification set `Wi`,
/// built by walking the splitting tree from the root to the leaf that
/// identifies `i` and collecting every `distinguishing_seq` on the way
/// (spec §4.3.7 "HSI"). Narrower than a global characterizing set —
/// `Wi` only needs to tell `i` apart from whatever it was still
/// confused with at each step, not from every other state.
pub fn get_hsi(m: &Dfsm) -> Vec<Vec<Vec<Input>>> {
    let tree = SplittingTree::build(m, true);
    m.states().map(|s| hsi_for_state(&tree, m, s)).collect()
}

fn hsi_for_state(tree: &SplittingTree, m: &Dfsm, s: StateId) -> Vec<Vec<Input>> {
    let mut seqs = Vec::new();
    let mut node = tree.root;
    let mut cur = s;
    loop {
        if tree.identified_state(node).is_some() {
            break;
        }
        let Some(seq) = tree.node(node).distinguishing_seq.clone() else {
            break;
        };
        let out = m.get_output_along_path(cur, &seq);
        cur = m.get_end_path_state(cur, &seq);
        seqs.push(seq);
        let Some(next) = tree.branch(node, &out) else {
            break;
        };
        node = next;
    }
    seqs
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineKind;

    fn reduced_moore_example() -> Dfsm {
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
        m
    }

    #[test]
    fn characterizing_set_distinguishes_every_pair() {
        let m = reduced_moore_example();
        let w = get_characterizing_set(&m);
        for (i, j) in all_pairs(m.num_states()) {
            assert!(w
                .iter()
                .any(|seq| m.get_output_along_path(i, seq) != m.get_output_along_path(j, seq)));
        }
    }

    #[test]
    fn hsi_distinguishes_each_state_from_every_other() {
        let m = reduced_moore_example();
        let hsi = get_hsi(&m);
        for i in m.states() {
            for j in m.states().filter(|&j| j != i) {
                assert!(hsi[i as usize].iter().any(|seq| {
                    m.get_output_along_path(i, seq) != m.get_output_along_path(j, seq)
                }));
            }
        }
    }
}
