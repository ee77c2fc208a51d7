//! Discrimination-tree learner (spec §4.6.2): a tree of distinguishing
//! sequences whose leaves are states, with sift-based classification
//! and counterexample-driven splitting.

use std::collections::HashMap;

use fsm::Dfsm;
use fsm_core::{Input, MachineKind, Output};
use tracing::{debug, trace};

use crate::blackbox::{BlackBox, Teacher};
use crate::learn::{NoCancellation, TentativeModelSink};

enum NodeKind {
    Leaf { state: u32 },
    Internal { sequence: Vec<Input>, children: HashMap<Vec<Output>, usize> },
}

struct Node {
    kind: NodeKind,
    parent: Option<usize>,
    level: usize,
}

struct Tree {
    nodes: Vec<Node>,
    /// `leaf_node[state]` = node index of that state's leaf.
    leaf_node: Vec<usize>,
    /// `leaf_access[state]` = the access sequence that first revealed it.
    leaf_access: Vec<Vec<Input>>,
}

impl Tree {
    fn new() -> Self {
        Tree {
            nodes: vec![Node { kind: NodeKind::Leaf { state: 0 }, parent: None, level: 0 }],
            leaf_node: vec![0],
            leaf_access: vec![Vec::new()],
        }
    }

    fn response<B: BlackBox>(&self, teacher: &Teacher<B>, access: &[Input], sequence: &[Input]) -> Vec<Output> {
        let mut w = access.to_vec();
        w.extend_from_slice(sequence);
        let trace = teacher.output_query_full_trace(&w).expect("reset always succeeds");
        trace[trace.len() - sequence.len()..].to_vec()
    }

    /// Classifies `access`, creating a new leaf (and thus a new state)
    /// the first time a tree node's response to it has never been seen.
    fn sift<B: BlackBox>(&mut self, teacher: &Teacher<B>, access: &[Input]) -> u32 {
        let mut cur = 0usize;
        loop {
            let sequence = match &self.nodes[cur].kind {
                NodeKind::Leaf { state } => return *state,
                NodeKind::Internal { sequence, .. } => sequence.clone(),
            };
            let key = self.response(teacher, access, &sequence);
            let existing = match &self.nodes[cur].kind {
                NodeKind::Internal { children, .. } => children.get(&key).copied(),
                NodeKind::Leaf { .. } => unreachable!(),
            };
            if let Some(child) = existing {
                cur = child;
                continue;
            }
            let new_state = self.leaf_node.len() as u32;
            let new_idx = self.nodes.len();
            let level = self.nodes[cur].level + 1;
            self.nodes.push(Node { kind: NodeKind::Leaf { state: new_state }, parent: Some(cur), level });
            self.leaf_node.push(new_idx);
            self.leaf_access.push(access.to_vec());
            if let NodeKind::Internal { children, .. } = &mut self.nodes[cur].kind {
                children.insert(key, new_idx);
            }
            trace!(new_state, ?access, "discrimination tree sifted to a new state");
            return new_state;
        }
    }

    fn num_states(&self) -> usize {
        self.leaf_node.len()
    }
}

fn binary_search_breakpoint<B: BlackBox>(
    tree: &Tree,
    teacher: &Teacher<B>,
    hyp: &Dfsm,
    ce: &[Input],
) -> usize {
    let n = ce.len();
    let mut lo = 0usize;
    let mut hi = n;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        let state = hyp.get_end_path_state(0, &ce[..mid]);
        let access = tree.leaf_access[state as usize].clone();
        let mut w = access;
        w.extend_from_slice(&ce[mid..]);
        let observed = teacher.output_query_full_trace(&w).expect("reset always succeeds");
        let predicted = hyp.get_output_along_path(0, &w);
        if observed == predicted {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}

fn process_counterexample<B: BlackBox>(tree: &mut Tree, teacher: &Teacher<B>, hyp: &Dfsm, ce: &[Input]) {
    let hi = binary_search_breakpoint(tree, teacher, hyp, ce);
    let suffix = ce[hi..].to_vec();
    let old_state = hyp.get_end_path_state(0, &ce[..hi]);
    let old_leaf = tree.leaf_node[old_state as usize];
    let old_access = tree.leaf_access[old_state as usize].clone();
    let new_access = ce[..hi].to_vec();

    let old_key = tree.response(teacher, &old_access, &suffix);
    let new_key = tree.response(teacher, &new_access, &suffix);
    debug!(old_state, hi, ?suffix, "discrimination tree split");

    let parent = tree.nodes[old_leaf].parent;
    let level = tree.nodes[old_leaf].level;

    let old_leaf_new_idx = tree.nodes.len();
    tree.nodes.push(Node { kind: NodeKind::Leaf { state: old_state }, parent: Some(old_leaf), level: level + 1 });
    tree.leaf_node[old_state as usize] = old_leaf_new_idx;

    let new_state = tree.leaf_node.len() as u32;
    let new_leaf_idx = tree.nodes.len();
    tree.nodes.push(Node { kind: NodeKind::Leaf { state: new_state }, parent: Some(old_leaf), level: level + 1 });
    tree.leaf_node.push(new_leaf_idx);
    tree.leaf_access.push(new_access);

    let mut children = HashMap::new();
    children.insert(old_key, old_leaf_new_idx);
    children.insert(new_key, new_leaf_idx);
    tree.nodes[old_leaf] = Node { kind: NodeKind::Internal { sequence: suffix, children }, parent, level };
}

fn build_hypothesis<B: BlackBox>(tree: &mut Tree, teacher: &Teacher<B>, kind: MachineKind, num_inputs: u32, num_outputs: u32) -> Dfsm {
    let mut m = Dfsm::create(tree.num_states() as u32, num_inputs, num_outputs, kind);
    let mut frontier = tree.leaf_access.clone();
    let mut idx = 0;
    while idx < frontier.len() {
        let access = frontier[idx].clone();
        for i in 0..num_inputs {
            let mut si = access.clone();
            si.push(i);
            let target = tree.sift(teacher, &si);
            if target as usize == frontier.len() {
                frontier.push(si.clone());
            }
            let out = if kind.has_transition_output() {
                let trace = teacher.output_query_full_trace(&si).expect("reset always succeeds");
                *trace.last().expect("non-empty")
            } else {
                0
            };
            if (idx as u32) < m.num_states() && target < m.num_states() {
                m.set_transition(idx as u32, i, target, Some(out)).expect("valid indices");
            }
        }
        idx += 1;
    }
    // `sift` may have grown the tree beyond the conjecture built above;
    // rebuild once more with the final state count so every transition
    // lands in range.
    if tree.num_states() as u32 != m.num_states() {
        return build_hypothesis(tree, teacher, kind, num_inputs, num_outputs);
    }
    if kind.has_state_output() {
        use fsm_core::STOUT_INPUT;
        for state in 0..tree.num_states() {
            let mut seq = tree.leaf_access[state].clone();
            seq.push(STOUT_INPUT);
            let trace = teacher.output_query_full_trace(&seq).expect("reset always succeeds");
            let out = *trace.last().expect("non-empty");
            m.set_output(state as u32, out, None).expect("valid state index");
        }
    }
    m
}

pub fn learn<B: BlackBox>(teacher: &Teacher<B>, max_extra_states: u32) -> Dfsm {
    learn_with_cancellation(teacher, max_extra_states, &mut NoCancellation)
}

pub fn learn_with_cancellation<B: BlackBox>(
    teacher: &Teacher<B>,
    max_extra_states: u32,
    cancellation: &mut dyn TentativeModelSink,
) -> Dfsm {
    let kind = teacher.black_box().model_kind();
    let num_inputs = teacher.num_inputs();
    let num_outputs = teacher.num_outputs();
    let mut tree = Tree::new();

    loop {
        let hyp = build_hypothesis(&mut tree, teacher, kind, num_inputs, num_outputs);
        debug!(states = hyp.num_states(), "discrimination tree conjecture ready");
        if !cancellation.provide(&hyp) {
            return hyp;
        }
        match teacher.equivalence_query(&hyp, max_extra_states) {
            None => return hyp,
            Some(ce) => process_counterexample(&mut tree, teacher, &hyp, &ce),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackbox::ModelBackedBlackBox;

    fn two_state_mealy() -> Dfsm {
        let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
        m.set_transition(0, 0, 0, Some(0)).unwrap();
        m.set_transition(0, 1, 1, Some(0)).unwrap();
        m.set_transition(1, 0, 0, Some(0)).unwrap();
        m.set_transition(1, 1, 1, Some(1)).unwrap();
        m
    }

    #[test]
    fn converges_on_two_state_machine() {
        let reference = two_state_mealy();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let hyp = learn(&teacher, 2);
        let verify = Teacher::new(ModelBackedBlackBox::new(reference), false);
        assert!(verify.equivalence_query(&hyp, 0).is_none());
    }

    #[test]
    fn converges_on_three_state_machine() {
        let mut reference = Dfsm::create(3, 2, 2, MachineKind::Mealy);
        reference.set_transition(0, 0, 1, Some(0)).unwrap();
        reference.set_transition(0, 1, 0, Some(0)).unwrap();
        reference.set_transition(1, 0, 2, Some(0)).unwrap();
        reference.set_transition(1, 1, 0, Some(1)).unwrap();
        reference.set_transition(2, 0, 2, Some(1)).unwrap();
        reference.set_transition(2, 1, 1, Some(1)).unwrap();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let hyp = learn(&teacher, 3);
        let verify = Teacher::new(ModelBackedBlackBox::new(reference), false);
        assert!(verify.equivalence_query(&hyp, 0).is_none());
    }
}
