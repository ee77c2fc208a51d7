//! Observation-tree learners (H-, SPY-, S-, spec §4.6.5).
//!
//! Unlike the discrimination tree (a tree of *distinguishing sequences*
//! with states as leaves), the observation tree is a trie of every
//! *access sequence* actually queried: one node per explored prefix,
//! each carrying a `domain` of reference states it could still be, and
//! a `convergent` node id grouping tree nodes believed to be the same
//! state. Domains narrow by one-step SVS elimination against the
//! current conjecture (`identify`) and propagate toward the root
//! (`check_previous`); four structurally distinct situations can come
//! out of that narrowing, matching spec §4.6.5's inconsistency kinds.

use itertools::Itertools;

use fsm::sequence::pair_index::idx;
use fsm::sequence::{separating, svs};
use fsm::Dfsm;
use fsm_core::collections::{Map, Set};
use fsm_core::{Input, MachineKind, Output, StateId, STOUT_INPUT};
use tracing::debug;

use crate::blackbox::{BlackBox, Teacher};
use crate::learn::{NoCancellation, TentativeModelSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationTreeMethod {
    H,
    Spy,
    S,
}

impl ObservationTreeMethod {
    fn suite(self, m: &Dfsm, extra_states: u32) -> Vec<Vec<Input>> {
        match self {
            ObservationTreeMethod::H => fsm::testing::h_method(m, extra_states).cases(),
            ObservationTreeMethod::Spy => fsm::testing::spy_method(m, extra_states).cases(),
            ObservationTreeMethod::S => fsm::testing::s_method(m, extra_states).cases(),
        }
    }
}

/// spec §4.6.5's four named inconsistency kinds, kept as distinct
/// variants rather than one shared split routine so each can carry its
/// own repair data and log its own message.
#[derive(Debug, Clone)]
enum Inconsistency {
    /// A node's domain narrowed to nothing: it matches no known state.
    NewStateRevealed { node: usize },
    /// A node's domain still has more than one survivor after SVS
    /// elimination against every known state; `separating_suffix`
    /// (empty if the conjecture itself doesn't yet separate the
    /// remaining candidates) is queried to narrow further.
    EmptyConvergentDomain { convergent: usize, separating_suffix: Vec<Input> },
    /// Domain propagation (`check_previous`) excluded a node's already
    /// assigned state; it must be re-identified.
    InconsistentDomain { node: usize, assigned_state: StateId },
    /// Two convergent nodes were treated as the same state, but a
    /// one-step probe shows they actually behave differently.
    WrongMerge { node_a: usize, node_b: usize },
}

/// One node of the observation tree: the access sequence that reached
/// it, what was observed getting there, and the narrowing `domain` of
/// reference states it could still represent (spec §4.6.5 "State").
struct TreeNode {
    access: Vec<Input>,
    incoming_output: Option<Output>,
    state_output: Option<Output>,
    parent: Option<usize>,
    children: Map<Input, usize>,
    domain: Set<StateId>,
    state: Option<StateId>,
    convergent: usize,
}

/// Groups tree nodes believed to represent the same reference state
/// (spec §4.6.5 "convergent node"). Not consulted for its own domain
/// here — each member keeps its own, narrowed independently — it only
/// exists so [`Inconsistency::WrongMerge`] has something to name.
struct ConvergentNode {
    members: Set<usize>,
}

struct ObservationTree {
    nodes: Vec<TreeNode>,
    convergents: Vec<ConvergentNode>,
    /// `state_rep[state]` — the tree node chosen as that conjecture
    /// state's access sequence, bidirectionally so [`Self::verify_merge`]
    /// can look a state up by either side.
    state_rep: bimap::BiMap<StateId, usize>,
}

impl ObservationTree {
    fn new() -> Self {
        let mut state_rep = bimap::BiMap::new();
        let _ = state_rep.insert(0, 0);
        ObservationTree {
            nodes: vec![TreeNode {
                access: Vec::new(),
                incoming_output: None,
                state_output: None,
                parent: None,
                children: Map::new(),
                domain: Set::from_iter([0]),
                state: Some(0),
                convergent: 0,
            }],
            convergents: vec![ConvergentNode { members: Set::from_iter([0]) }],
            state_rep,
        }
    }

    fn num_states(&self) -> u32 {
        self.state_rep.len() as u32
    }

    /// Extends the trie by one input from `node_idx`, querying the real
    /// black box only the first time that child is visited.
    fn ensure_child<B: BlackBox>(&mut self, teacher: &Teacher<B>, kind: MachineKind, node_idx: usize, input: Input) -> usize {
        if let Some(&child) = self.nodes[node_idx].children.get(&input) {
            return child;
        }
        let mut access = self.nodes[node_idx].access.clone();
        access.push(input);
        let trace = teacher.output_query_full_trace(&access).expect("reset always succeeds");
        let incoming_output = trace.last().copied();
        let state_output = if kind.has_state_output() {
            let mut w = access.clone();
            w.push(STOUT_INPUT);
            let t = teacher.output_query_full_trace(&w).expect("reset always succeeds");
            t.last().copied()
        } else {
            None
        };

        let child_idx = self.nodes.len();
        let convergent = self.convergents.len();
        self.convergents.push(ConvergentNode { members: Set::from_iter([child_idx]) });
        self.nodes.push(TreeNode {
            access,
            incoming_output,
            state_output,
            parent: Some(node_idx),
            children: Map::new(),
            domain: Set::new(),
            state: None,
            convergent,
        });
        self.nodes[node_idx].children.insert(input, child_idx);
        child_idx
    }

    /// Narrows `node_idx`'s domain by eliminating, for every known
    /// state `d`, one whose state-verifying sequence (against `hyp`)
    /// predicts behavior the real black box doesn't show (spec §4.6.5
    /// "Identify"). Singleton domain after elimination identifies the
    /// node; empty domain is new-state-revealed; more than one survivor
    /// raises empty-convergent-domain and queries a suffix separating
    /// the two lowest-numbered survivors to narrow further next round.
    fn identify<B: BlackBox>(&mut self, teacher: &Teacher<B>, hyp: &Dfsm, node_idx: usize) -> Result<StateId, Inconsistency> {
        if self.nodes[node_idx].state.is_none() {
            self.nodes[node_idx].domain = (0..hyp.num_states()).collect();
        }
        let access = self.nodes[node_idx].access.clone();
        let candidates: Vec<StateId> = self.nodes[node_idx].domain.iter().copied().sorted().collect();
        let mut survivors = self.nodes[node_idx].domain.clone();

        for d in candidates {
            let Some(sep) = svs::get_state_verifying_sequence(hyp, d) else {
                continue;
            };
            let observed = query_tail(teacher, &access, &sep);
            if observed != hyp.get_output_along_path(d, &sep) {
                survivors.shift_remove(&d);
            }
        }
        self.nodes[node_idx].domain = survivors.clone();

        match survivors.len() {
            0 => {
                debug!(node = node_idx, "observation tree: new-state-revealed inconsistency");
                Err(Inconsistency::NewStateRevealed { node: node_idx })
            }
            1 => {
                let state = survivors[0];
                self.nodes[node_idx].state = Some(state);
                Ok(state)
            }
            _ => {
                let mut ranked = survivors.iter().copied().sorted();
                let a = ranked.next().expect("len > 1");
                let b = ranked.next().expect("len > 1");
                let suffix = separating::shortest_separating_sequences(hyp, true)[idx(a, b)].clone();
                if !suffix.is_empty() {
                    let observed = query_tail(teacher, &access, &suffix);
                    for d in [a, b] {
                        if observed != hyp.get_output_along_path(d, &suffix) {
                            self.nodes[node_idx].domain.shift_remove(&d);
                        }
                    }
                }
                debug!(node = node_idx, a, b, "observation tree: empty-convergent-domain inconsistency");
                Err(Inconsistency::EmptyConvergentDomain {
                    convergent: self.nodes[node_idx].convergent,
                    separating_suffix: suffix,
                })
            }
        }
    }

    /// Propagates a narrowed domain from `node_idx` toward the root:
    /// a parent reached from `node_idx` by one input can only be a
    /// state whose transition on that input lands in `node_idx`'s
    /// domain with the output actually observed (spec §4.6.5 (iii)).
    fn check_previous(&mut self, hyp: &Dfsm, node_idx: usize) -> Option<Inconsistency> {
        let mut cur = node_idx;
        loop {
            let parent_idx = self.nodes[cur].parent?;
            let input = *self.nodes[cur].access.last().expect("non-root node has an access sequence");
            let incoming_output = self.nodes[cur].incoming_output;
            let child_domain = self.nodes[cur].domain.clone();

            let filtered: Set<StateId> = self.nodes[parent_idx]
                .domain
                .iter()
                .copied()
                .filter(|&p| {
                    hyp.has_transition(p, input)
                        && child_domain.contains(&hyp.get_next_state(p, input))
                        && incoming_output.is_none_or(|o| hyp.get_output(p, input) == o)
                })
                .collect();

            if filtered.len() == self.nodes[parent_idx].domain.len() {
                return None;
            }
            self.nodes[parent_idx].domain = filtered.clone();

            if filtered.is_empty() {
                return Some(match self.nodes[parent_idx].state {
                    Some(s) => Inconsistency::InconsistentDomain { node: parent_idx, assigned_state: s },
                    None => Inconsistency::NewStateRevealed { node: parent_idx },
                });
            }
            if let Some(s) = self.nodes[parent_idx].state {
                if !filtered.contains(&s) {
                    return Some(Inconsistency::InconsistentDomain { node: parent_idx, assigned_state: s });
                }
            }
            cur = parent_idx;
        }
    }

    /// A cheap one-step probe confirming a freshly identified node
    /// really does belong with the existing representative of `state`
    /// (spec §4.6.5 wrong-merge: "a later query distinguishes them").
    fn verify_merge<B: BlackBox>(&self, teacher: &Teacher<B>, node_idx: usize, state: StateId, num_inputs: u32) -> Option<Inconsistency> {
        let &rep_idx = self.state_rep.get_by_left(&state)?;
        if rep_idx == node_idx {
            return None;
        }
        let access_a = self.nodes[rep_idx].access.clone();
        let access_b = self.nodes[node_idx].access.clone();
        for i in 0..num_inputs {
            let oa = query_tail(teacher, &access_a, &[i]);
            let ob = query_tail(teacher, &access_b, &[i]);
            if oa != ob {
                debug!(rep_idx, node_idx, state, input = i, "observation tree: wrong-merge inconsistency");
                return Some(Inconsistency::WrongMerge { node_a: rep_idx, node_b: node_idx });
            }
        }
        None
    }

    fn resolve(&mut self, inc: Inconsistency) {
        match inc {
            Inconsistency::NewStateRevealed { node } => {
                let state = self.num_states();
                self.nodes[node].domain = Set::from_iter([state]);
                self.nodes[node].state = Some(state);
                if self.state_rep.get_by_left(&state).is_none() {
                    let _ = self.state_rep.insert(state, node);
                }
                debug!(node, state, "observation tree: new-state-revealed inconsistency resolved");
            }
            Inconsistency::EmptyConvergentDomain { .. } => {}
            Inconsistency::InconsistentDomain { node, assigned_state } => {
                debug!(node, assigned_state, "observation tree: inconsistent-domain inconsistency resolved");
                self.nodes[node].state = None;
            }
            Inconsistency::WrongMerge { node_a, node_b } => {
                let state = self.num_states();
                self.nodes[node_b].domain = Set::from_iter([state]);
                self.nodes[node_b].state = Some(state);
                if self.state_rep.get_by_left(&state).is_none() {
                    let _ = self.state_rep.insert(state, node_b);
                }
                debug!(node_a, node_b, state, "observation tree: wrong-merge inconsistency resolved");
            }
        }
    }

    /// Drives a node to a stable, confirmed state assignment: identify,
    /// check for a wrong merge, propagate the result toward the root,
    /// and retry whenever any of those raises a resolvable
    /// inconsistency. Terminates because empty-convergent-domain
    /// strictly shrinks the node's domain each retry and every other
    /// kind resolves in one step.
    fn settle<B: BlackBox>(&mut self, teacher: &Teacher<B>, hyp: &Dfsm, node_idx: usize, num_inputs: u32) -> StateId {
        loop {
            match self.identify(teacher, hyp, node_idx) {
                Ok(state) => {
                    if let Some(inc) = self.verify_merge(teacher, node_idx, state, num_inputs) {
                        self.resolve(inc);
                        continue;
                    }
                    if let Some(inc) = self.check_previous(hyp, node_idx) {
                        self.resolve(inc);
                        continue;
                    }
                    if self.state_rep.get_by_left(&state).is_none() {
                        let _ = self.state_rep.insert(state, node_idx);
                    }
                    return state;
                }
                Err(Inconsistency::EmptyConvergentDomain { separating_suffix, .. }) if separating_suffix.is_empty() => {
                    // The conjecture itself doesn't yet separate the
                    // remaining candidates; settle for the lowest one
                    // rather than loop without progress, and let a
                    // later round correct it via inconsistent-domain.
                    let state = self.nodes[node_idx].domain.iter().copied().min().expect("len > 1");
                    self.nodes[node_idx].state = Some(state);
                    if self.state_rep.get_by_left(&state).is_none() {
                        let _ = self.state_rep.insert(state, node_idx);
                    }
                    return state;
                }
                Err(inc) => {
                    let terminal = matches!(inc, Inconsistency::NewStateRevealed { .. } | Inconsistency::WrongMerge { .. });
                    self.resolve(inc);
                    if terminal {
                        return self.nodes[node_idx].state.expect("resolve just assigned a state");
                    }
                }
            }
        }
    }

    /// Rebuilds the conjecture's transition table by settling every
    /// known state's successors against the *previous* conjecture
    /// `hyp` (used only as the reference for SVS computations — it may
    /// be stale by one round, which [`Self::build_hypothesis`] corrects
    /// by re-invoking until the state count stops growing).
    fn materialize<B: BlackBox>(
        &mut self,
        teacher: &Teacher<B>,
        hyp: &Dfsm,
        kind: MachineKind,
        num_inputs: u32,
        num_outputs: u32,
    ) -> Dfsm {
        let mut m = Dfsm::create(self.num_states().max(1), num_inputs, num_outputs, kind);
        let mut state = 0u32;
        while state < self.num_states() {
            let Some(&node_idx) = self.state_rep.get_by_left(&state) else {
                state += 1;
                continue;
            };
            for i in 0..num_inputs {
                let child = self.ensure_child(teacher, kind, node_idx, i);
                let target = self.settle(teacher, hyp, child, num_inputs);
                let out = if kind.has_transition_output() {
                    self.nodes[child].incoming_output.expect("ensure_child records it for every kind")
                } else {
                    0
                };
                if state < m.num_states() && target < m.num_states() {
                    m.set_transition(state, i, target, Some(out)).expect("valid indices");
                }
            }
            state += 1;
        }
        if kind.has_state_output() {
            for s in 0..m.num_states() {
                if let Some(&node_idx) = self.state_rep.get_by_left(&s) {
                    let out = self.nodes[node_idx].state_output.expect("state-output kind records it");
                    m.set_output(s, out, None).expect("valid state index");
                }
            }
        }
        m
    }

    fn build_hypothesis<B: BlackBox>(&mut self, teacher: &Teacher<B>, kind: MachineKind, num_inputs: u32, num_outputs: u32) -> Dfsm {
        let mut hyp = Dfsm::create(self.num_states().max(1), num_inputs, num_outputs, kind);
        loop {
            let before = self.num_states();
            hyp = self.materialize(teacher, &hyp, kind, num_inputs, num_outputs);
            if self.num_states() == before {
                return hyp;
            }
        }
    }

    /// Walks a counterexample from the root, extending the trie one
    /// input at a time, and settles the node it ends on — letting
    /// `identify`'s SVS elimination locate and resolve the divergence
    /// rather than a dedicated binary search over the sequence
    /// (simplification from spec §4.6.2's discrimination-tree CE
    /// handling; see `DESIGN.md`).
    fn explore<B: BlackBox>(&mut self, teacher: &Teacher<B>, hyp: &Dfsm, kind: MachineKind, ce: &[Input], num_inputs: u32) {
        let mut cur = 0usize;
        for &i in ce {
            cur = self.ensure_child(teacher, kind, cur, i);
        }
        self.settle(teacher, hyp, cur, num_inputs);
    }
}

fn query_tail<B: BlackBox>(teacher: &Teacher<B>, access: &[Input], suffix: &[Input]) -> Vec<Output> {
    let mut w = access.to_vec();
    w.extend_from_slice(suffix);
    let trace = teacher.output_query_full_trace(&w).expect("reset always succeeds");
    trace[trace.len() - suffix.len()..].to_vec()
}

/// Scans `method`'s test suite at increasing `extraStates` for a
/// sequence whose observed trace diverges from `hyp`'s prediction —
/// the "extra-states loop" of spec §4.6.5.
fn find_divergence<B: BlackBox>(
    teacher: &Teacher<B>,
    hyp: &Dfsm,
    method: ObservationTreeMethod,
    max_extra_states: u32,
) -> Option<Vec<Input>> {
    for k in 0..=max_extra_states {
        for case in method.suite(hyp, k) {
            let observed = teacher.output_query_full_trace(&case).expect("reset always succeeds");
            let predicted = hyp.get_output_along_path(0, &case);
            if observed != predicted {
                return Some(case);
            }
        }
    }
    None
}

pub fn learn<B: BlackBox>(teacher: &Teacher<B>, method: ObservationTreeMethod, max_extra_states: u32) -> Dfsm {
    learn_with_cancellation(teacher, method, max_extra_states, &mut NoCancellation)
}

pub fn learn_with_cancellation<B: BlackBox>(
    teacher: &Teacher<B>,
    method: ObservationTreeMethod,
    max_extra_states: u32,
    cancellation: &mut dyn TentativeModelSink,
) -> Dfsm {
    let kind = teacher.black_box().model_kind();
    let num_inputs = teacher.num_inputs();
    let num_outputs = teacher.num_outputs();
    let mut tree = ObservationTree::new();

    loop {
        let hyp = tree.build_hypothesis(teacher, kind, num_inputs, num_outputs);
        debug!(states = hyp.num_states(), ?method, "observation tree conjecture ready");
        if !cancellation.provide(&hyp) {
            return hyp;
        }

        if let Some(ce) = find_divergence(teacher, &hyp, method, max_extra_states) {
            tree.explore(teacher, &hyp, kind, &ce, num_inputs);
            continue;
        }

        match teacher.equivalence_query(&hyp, max_extra_states) {
            None => return hyp,
            Some(ce) => tree.explore(teacher, &hyp, kind, &ce, num_inputs),
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

    fn three_state_mealy() -> Dfsm {
        let mut m = Dfsm::create(3, 2, 2, MachineKind::Mealy);
        m.set_transition(0, 0, 1, Some(0)).unwrap();
        m.set_transition(0, 1, 0, Some(0)).unwrap();
        m.set_transition(1, 0, 2, Some(0)).unwrap();
        m.set_transition(1, 1, 0, Some(1)).unwrap();
        m.set_transition(2, 0, 2, Some(1)).unwrap();
        m.set_transition(2, 1, 1, Some(1)).unwrap();
        m
    }

    fn three_state_moore() -> Dfsm {
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
    fn h_method_converges() {
        let reference = two_state_mealy();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let hyp = learn(&teacher, ObservationTreeMethod::H, 2);
        let verify = Teacher::new(ModelBackedBlackBox::new(reference), false);
        assert!(verify.equivalence_query(&hyp, 0).is_none());
    }

    #[test]
    fn spy_method_converges() {
        let reference = three_state_mealy();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let hyp = learn(&teacher, ObservationTreeMethod::Spy, 3);
        let verify = Teacher::new(ModelBackedBlackBox::new(reference), false);
        assert!(verify.equivalence_query(&hyp, 0).is_none());
    }

    #[test]
    fn s_method_converges() {
        let reference = three_state_mealy();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let hyp = learn(&teacher, ObservationTreeMethod::S, 3);
        let verify = Teacher::new(ModelBackedBlackBox::new(reference), false);
        assert!(verify.equivalence_query(&hyp, 0).is_none());
    }

    #[test]
    fn h_method_converges_on_a_moore_machine() {
        let reference = three_state_moore();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let hyp = learn(&teacher, ObservationTreeMethod::H, 3);
        let verify = Teacher::new(ModelBackedBlackBox::new(reference), false);
        assert!(verify.equivalence_query(&hyp, 0).is_none());
    }
}
