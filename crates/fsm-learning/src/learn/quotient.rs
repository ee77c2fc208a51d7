//! Quotient learner (spec §4.6.6): merges an observation tree into a
//! conjecture by iterative state-merging, guided by a prefix set of
//! distinguishing sequences maintained across iterations.

use std::collections::HashMap;

use fsm::sequence::PrefixSet;
use fsm::Dfsm;
use fsm_core::{Input, MachineKind, Output, STOUT_INPUT};
use tracing::debug;

use crate::blackbox::{BlackBox, Teacher};
use crate::learn::{NoCancellation, TentativeModelSink};

struct Quotient {
    /// One representative access sequence per equivalence class found
    /// so far (the merged conjecture states).
    reps: Vec<Vec<Input>>,
    distinguishers: PrefixSet,
}

impl Quotient {
    fn new() -> Self {
        Quotient { reps: vec![Vec::new()], distinguishers: PrefixSet::new() }
    }

    fn row<B: BlackBox>(&self, teacher: &Teacher<B>, access: &[Input], suffixes: &[Vec<Input>]) -> Vec<Output> {
        suffixes
            .iter()
            .map(|suffix| {
                let mut w = access.to_vec();
                w.extend_from_slice(suffix);
                let trace = teacher.output_query_full_trace(&w).expect("reset always succeeds");
                *trace.last().expect("non-empty suffix")
            })
            .collect()
    }

    /// Extends every known class by one input, merging each successor
    /// into an existing class when its row already matches one, else
    /// starting a new class. Returns whether any new class appeared.
    fn expand_frontier<B: BlackBox>(&mut self, teacher: &Teacher<B>, num_inputs: u32) -> bool {
        let suffixes = self.distinguishers.get_maximal_sequences();
        let rep_rows: Vec<Vec<Output>> = self.reps.iter().map(|a| self.row(teacher, a, &suffixes)).collect();
        let mut new_reps = Vec::new();
        for access in self.reps.clone() {
            for i in 0..num_inputs {
                let mut succ = access.clone();
                succ.push(i);
                let row = self.row(teacher, &succ, &suffixes);
                let known = rep_rows.contains(&row) || new_reps.iter().any(|(r, _): &(Vec<Output>, Vec<Input>)| *r == row);
                if !known {
                    new_reps.push((row, succ));
                }
            }
        }
        let added = !new_reps.is_empty();
        self.reps.extend(new_reps.into_iter().map(|(_, access)| access));
        added
    }

    fn merge_classes(&self) -> Vec<Vec<Input>> {
        self.reps.clone()
    }

    fn build_hypothesis<B: BlackBox>(
        &self,
        teacher: &Teacher<B>,
        reps: &[Vec<Input>],
        kind: MachineKind,
        num_inputs: u32,
        num_outputs: u32,
    ) -> Dfsm {
        let suffixes = self.distinguishers.get_maximal_sequences();
        let rep_rows: Vec<Vec<Output>> = reps.iter().map(|a| self.row(teacher, a, &suffixes)).collect();
        let mut m = Dfsm::create(reps.len() as u32, num_inputs, num_outputs, kind);
        for (state, access) in reps.iter().enumerate() {
            for i in 0..num_inputs {
                let mut succ = access.clone();
                succ.push(i);
                let row = self.row(teacher, &succ, &suffixes);
                let target = rep_rows
                    .iter()
                    .position(|r| *r == row)
                    .expect("every successor matches a known class once merged") as u32;
                let out = if kind.has_transition_output() {
                    let trace = teacher.output_query_full_trace(&succ).expect("reset always succeeds");
                    *trace.last().expect("non-empty")
                } else {
                    0
                };
                m.set_transition(state as u32, i, target, Some(out)).expect("valid indices");
            }
            if kind.has_state_output() {
                let mut seq = access.clone();
                seq.push(STOUT_INPUT);
                let trace = teacher.output_query_full_trace(&seq).expect("reset always succeeds");
                m.set_output(state as u32, *trace.last().expect("non-empty"), None).expect("valid state index");
            }
        }
        m
    }
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
    let mut q = Quotient::new();

    loop {
        while q.expand_frontier(teacher, num_inputs) {}

        let reps = q.merge_classes();
        let hyp = q.build_hypothesis(teacher, &reps, kind, num_inputs, num_outputs);
        debug!(states = hyp.num_states(), "quotient conjecture ready");
        if !cancellation.provide(&hyp) {
            return hyp;
        }

        match teacher.equivalence_query(&hyp, max_extra_states) {
            None => return hyp,
            Some(ce) => {
                debug!(?ce, "quotient consistency failure, enlarging distinguisher set");
                for len in 1..=ce.len() {
                    q.distinguishers.insert(&ce[ce.len() - len..]);
                }
            }
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
