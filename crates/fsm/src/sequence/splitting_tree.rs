//! C3.2 / spec §3.5: the splitting tree, the structure underlying ADS
//! and HSI computation.
//!
//! Each node holds a block of `(original, current)` state pairs: the
//! original identity a candidate started as, and the actual state the
//! real machine is now in after every distinguishing sequence applied
//! from the root down to this node. Splitting always groups by output
//! observed from `current`, but identification must answer "which
//! `original` state were we" — the two can diverge the moment any
//! sequence moves the machine, so both have to be carried separately
//! (spec §3.5, §3.6).

use itertools::Itertools;

use fsm_core::collections::Map;
use fsm_core::{Input, Output, StateId};

use crate::Dfsm;

use super::pair_index::{all_pairs, idx};
use super::separating::shortest_separating_sequences;

#[derive(Debug, Clone)]
pub struct SplittingTreeNode {
    /// `(original, current)` pairs this node still has to tell apart.
    pub block: Vec<(StateId, StateId)>,
    /// The sequence applied (from each member's `current` state) to
    /// refine `block`. `None` for leaves (singleton blocks, or blocks
    /// the algorithm gave up on — see `undistinguished`).
    pub distinguishing_seq: Option<Vec<Input>>,
    /// Children keyed by the output sequence observed along
    /// `distinguishing_seq`, in order of first appearance.
    pub children: Vec<(Vec<Output>, usize)>,
    /// Set when `allow_invalid_inputs` let a block through without a
    /// witness separating every remaining pair (spec §4.3.2 point 3).
    pub undistinguished: bool,
}

/// The splitting tree over a reduced, compact [`Dfsm`].
#[derive(Debug, Clone)]
pub struct SplittingTree {
    pub nodes: Vec<SplittingTreeNode>,
    pub root: usize,
    /// `cur_node[state]` — lowest tree node whose block still contains `state`.
    pub cur_node: Vec<usize>,
    /// `distinguished[idx(i,j)]` — node at which `i`/`j` (original identities)
    /// were first separated.
    pub distinguished: Map<usize, usize>,
}

impl SplittingTree {
    /// Builds the splitting tree for `m`. Each node tries every input
    /// first (spec §4.3.2 step 1: injective on `(output, next_state)`
    /// over the block's current positions, and producing at least two
    /// output groups). Blocks with no such single input fall back to a
    /// precomputed pairwise separator (C3.1), generalizing
    /// "distinguishing input" to "distinguishing sequence" — a
    /// documented simplification of spec §4.3.2 step 2's shortest-path
    /// dependent-block closure; see `DESIGN.md`.
    pub fn build(m: &Dfsm, allow_invalid_inputs: bool) -> Self {
        let n = m.num_states();
        let pairwise = shortest_separating_sequences(m, true);

        let mut nodes = Vec::new();
        let mut cur_node = vec![0usize; n as usize];
        let mut distinguished: Map<usize, usize> = Map::new();

        let root_block: Vec<(StateId, StateId)> = (0..n).map(|s| (s, s)).collect();
        nodes.push(SplittingTreeNode {
            block: root_block,
            distinguishing_seq: None,
            children: Vec::new(),
            undistinguished: false,
        });
        let mut pending = vec![0usize];

        while !pending.is_empty() {
            // Process the largest remaining block first (spec §4.3.2).
            let (pos, &node_idx) = pending
                .iter()
                .enumerate()
                .max_by_key(|&(_, &idx)| nodes[idx].block.len())
                .unwrap();
            pending.remove(pos);

            let block = nodes[node_idx].block.clone();
            if block.len() <= 1 {
                for &(orig, _) in &block {
                    cur_node[orig as usize] = node_idx;
                }
                continue;
            }

            let found = find_distinguishing_input(m, &block);
            let (seq, groups) = match found {
                Some((a, groups)) => (vec![a], groups),
                None => match fallback_sequence(m, &block, &pairwise) {
                    Some((seq, groups)) => (seq, groups),
                    None => {
                        nodes[node_idx].undistinguished = allow_invalid_inputs;
                        for &(orig, _) in &block {
                            cur_node[orig as usize] = node_idx;
                        }
                        continue;
                    }
                },
            };

            nodes[node_idx].distinguishing_seq = Some(seq.clone());
            for (gi, group_a) in groups.iter().enumerate() {
                for group_b in groups.iter().skip(gi + 1) {
                    for &(o1, _) in &group_a.1 {
                        for &(o2, _) in &group_b.1 {
                            distinguished.entry(idx(o1, o2)).or_insert(node_idx);
                        }
                    }
                }
            }

            for (out_seq, members) in groups {
                let child_block: Vec<(StateId, StateId)> = members
                    .iter()
                    .map(|&(orig, cur)| (orig, m.get_end_path_state(cur, &seq)))
                    .collect();
                let child_idx = nodes.len();
                nodes.push(SplittingTreeNode {
                    block: child_block,
                    distinguishing_seq: None,
                    children: Vec::new(),
                    undistinguished: false,
                });
                nodes[node_idx].children.push((out_seq, child_idx));
                pending.push(child_idx);
            }
        }

        SplittingTree {
            nodes,
            root: 0,
            cur_node,
            distinguished,
        }
    }

    pub fn node(&self, idx: usize) -> &SplittingTreeNode {
        &self.nodes[idx]
    }

    /// Whether every leaf is a genuine singleton — i.e. the tree fully
    /// separates every state, with no block left to `allow_invalid_inputs`.
    pub fn is_complete(&self) -> bool {
        self.nodes
            .iter()
            .all(|n| !n.undistinguished && (!n.children.is_empty() || n.block.len() <= 1))
    }

    /// The child reached from `node_idx` after observing `output`
    /// along its `distinguishing_seq`, if any (spec §3.6 ADS branch-by-
    /// observed-output).
    pub fn branch(&self, node_idx: usize, output: &[Output]) -> Option<usize> {
        self.nodes[node_idx]
            .children
            .iter()
            .find(|(o, _)| o == output)
            .map(|&(_, c)| c)
    }

    /// The single remaining candidate's *original* state, if the block
    /// is a genuine singleton.
    pub fn identified_state(&self, node_idx: usize) -> Option<StateId> {
        let block = &self.nodes[node_idx].block;
        (block.len() == 1).then(|| block[0].0)
    }
}

type Group = (Vec<Output>, Vec<(StateId, StateId)>);

fn find_distinguishing_input(m: &Dfsm, block: &[(StateId, StateId)]) -> Option<(Input, Vec<Group>)> {
    for a in m.inputs() {
        let signals = block
            .iter()
            .map(|&(_, cur)| (m.get_output(cur, a), m.get_next_state(cur, a)))
            .collect_vec();
        if !signals.iter().all_unique() {
            continue;
        }
        let groups = group_by_output(m, block, &[a]);
        if groups.len() >= 2 {
            return Some((a, groups));
        }
    }
    None
}

fn fallback_sequence(
    m: &Dfsm,
    block: &[(StateId, StateId)],
    pairwise: &[Vec<Input>],
) -> Option<(Vec<Input>, Vec<Group>)> {
    // Try every pair's pairwise separator (between current positions)
    // as a candidate witness for the whole block, accepting the first
    // one that (a) actually splits the block into >= 2 groups and (b)
    // does not collapse two distinct members onto the same (output,
    // end-state) pair — the multi-symbol analogue of the single-input
    // injectivity check, so a bad witness can never silently merge two
    // states that still need to be told apart later.
    for w in 0..block.len() {
        for v in (w + 1)..block.len() {
            let (_, cw) = block[w];
            let (_, cv) = block[v];
            if cw == cv {
                continue;
            }
            let sep = &pairwise[idx(cw, cv)];
            if sep.is_empty() {
                continue;
            }
            let groups = group_by_output(m, block, sep);
            if groups.len() < 2 {
                continue;
            }
            let signals = block
                .iter()
                .map(|&(_, cur)| (m.get_output_along_path(cur, sep), m.get_end_path_state(cur, sep)))
                .collect_vec();
            if signals.iter().all_unique() {
                return Some((sep.clone(), groups));
            }
        }
    }
    None
}

fn group_by_output(m: &Dfsm, block: &[(StateId, StateId)], seq: &[Input]) -> Vec<Group> {
    let mut by_key: Map<Vec<Output>, usize> = Map::new();
    let mut groups: Vec<Group> = Vec::new();
    for &(orig, cur) in block {
        let out = m.get_output_along_path(cur, seq);
        let gi = *by_key.entry(out.clone()).or_insert_with(|| {
            groups.push((out, Vec::new()));
            groups.len() - 1
        });
        groups[gi].1.push((orig, cur));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineKind;

    fn reduced_moore_example() -> Dfsm {
        // 3-state Moore requiring a two-symbol witness (input then
        // STOUT) to split {0, 1} apart, since Moore transitions carry
        // no output of their own.
        let mut m = Dfsm::create(3, 2, 2, MachineKind::Moore);
        m.set_output(0, 0, None).unwrap(); // x
        m.set_output(1, 0, None).unwrap(); // x
        m.set_output(2, 1, None).unwrap(); // y
        m.set_transition(0, 0, 1, None).unwrap(); // 0 -a-> 1
        m.set_transition(0, 1, 0, None).unwrap(); // 0 -b-> 0
        m.set_transition(1, 0, 2, None).unwrap(); // 1 -a-> 2
        m.set_transition(1, 1, 1, None).unwrap(); // 1 -b-> 1
        m.set_transition(2, 0, 2, None).unwrap(); // 2 -a-> 2
        m.set_transition(2, 1, 0, None).unwrap(); // 2 -b-> 0
        m
    }

    #[test]
    fn builds_full_tree_for_reduced_machine() {
        let m = reduced_moore_example();
        let tree = SplittingTree::build(&m, false);
        for (i, j) in all_pairs(m.num_states()) {
            assert!(tree.distinguished.contains_key(&idx(i, j)));
        }
    }

    #[test]
    fn leaves_are_singletons() {
        let m = reduced_moore_example();
        let tree = SplittingTree::build(&m, false);
        for node in &tree.nodes {
            if node.children.is_empty() {
                assert!(node.block.len() <= 1 || node.undistinguished);
            }
        }
    }
}
