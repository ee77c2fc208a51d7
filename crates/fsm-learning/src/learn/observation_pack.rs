//! Observation-pack learner (spec §4.6.3): state components, each
//! distinguished from the others by a shared suffix set, split when a
//! member's row diverges from the component's representative.

use std::collections::HashMap;

use fsm::Dfsm;
use fsm_core::{Input, MachineKind, Output, STOUT_INPUT};
use tracing::debug;

use crate::blackbox::{BlackBox, Teacher};
use crate::learn::{NoCancellation, TentativeModelSink};

struct Component {
    members: Vec<Vec<Input>>,
}

impl Component {
    fn representative(&self) -> &[Input] {
        &self.members[0]
    }
}

struct Pack {
    components: Vec<Component>,
    suffixes: Vec<Vec<Input>>,
}

impl Pack {
    fn new() -> Self {
        Pack { components: vec![Component { members: vec![Vec::new()] }], suffixes: Vec::new() }
    }

    fn row<B: BlackBox>(&self, teacher: &Teacher<B>, access: &[Input]) -> Vec<Output> {
        self.suffixes
            .iter()
            .map(|suffix| {
                let mut w = access.to_vec();
                w.extend_from_slice(suffix);
                let trace = teacher.output_query_full_trace(&w).expect("reset always succeeds");
                *trace.last().expect("non-empty suffix")
            })
            .collect()
    }

    /// Re-partitions every component by row equality, splitting any
    /// component whose members now disagree. Returns whether anything
    /// changed.
    fn resplit<B: BlackBox>(&mut self, teacher: &Teacher<B>) -> bool {
        let mut changed = false;
        let mut new_components = Vec::new();
        for comp in &self.components {
            let mut groups: Vec<(Vec<Output>, Vec<Vec<Input>>)> = Vec::new();
            for member in &comp.members {
                let row = self.row(teacher, member);
                if let Some(g) = groups.iter_mut().find(|(r, _)| *r == row) {
                    g.1.push(member.clone());
                } else {
                    groups.push((row, vec![member.clone()]));
                }
            }
            if groups.len() > 1 {
                changed = true;
                debug!(groups = groups.len(), "observation pack component split");
            }
            for (_, members) in groups {
                new_components.push(Component { members });
            }
        }
        self.components = new_components;
        changed
    }

    fn component_of(&self, row: &[Output], teacher_rows: &HashMap<usize, Vec<Output>>) -> Option<usize> {
        self.components
            .iter()
            .enumerate()
            .find(|(idx, _)| teacher_rows.get(idx).map(|r| r.as_slice()) == Some(row))
            .map(|(idx, _)| idx)
    }

    /// Extends the frontier by one step in every input direction,
    /// creating a fresh singleton component for any successor whose row
    /// matches no existing component.
    fn close<B: BlackBox>(&mut self, teacher: &Teacher<B>, num_inputs: u32) -> bool {
        let rows: HashMap<usize, Vec<Output>> = self
            .components
            .iter()
            .enumerate()
            .map(|(idx, c)| (idx, self.row(teacher, c.representative())))
            .collect();
        let mut additions = Vec::new();
        for comp in &self.components {
            for i in 0..num_inputs {
                let mut succ = comp.representative().to_vec();
                succ.push(i);
                let row = self.row(teacher, &succ);
                if self.component_of(&row, &rows).is_none()
                    && !additions.iter().any(|(r, _): &(Vec<Output>, Vec<Input>)| *r == row)
                {
                    additions.push((row, succ));
                }
            }
        }
        let added = !additions.is_empty();
        for (_, succ) in additions {
            self.components.push(Component { members: vec![succ] });
        }
        added
    }

    fn build_hypothesis<B: BlackBox>(&self, teacher: &Teacher<B>, kind: MachineKind, num_inputs: u32, num_outputs: u32) -> Dfsm {
        let rows: Vec<Vec<Output>> = self.components.iter().map(|c| self.row(teacher, c.representative())).collect();
        let mut m = Dfsm::create(self.components.len() as u32, num_inputs, num_outputs, kind);
        for (state, comp) in self.components.iter().enumerate() {
            let access = comp.representative();
            for i in 0..num_inputs {
                let mut succ = access.to_vec();
                succ.push(i);
                let row = self.row(teacher, &succ);
                let target = rows
                    .iter()
                    .position(|r| *r == row)
                    .expect("every successor row matches a known component once closed") as u32;
                let out = if kind.has_transition_output() {
                    let trace = teacher.output_query_full_trace(&succ).expect("reset always succeeds");
                    *trace.last().expect("non-empty")
                } else {
                    0
                };
                m.set_transition(state as u32, i, target, Some(out)).expect("valid indices");
            }
            if kind.has_state_output() {
                let mut seq = access.to_vec();
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
    let mut pack = Pack::new();

    loop {
        loop {
            let split = pack.resplit(teacher);
            let closed = pack.close(teacher, num_inputs);
            if !split && !closed {
                break;
            }
        }

        let hyp = pack.build_hypothesis(teacher, kind, num_inputs, num_outputs);
        debug!(states = hyp.num_states(), "observation pack conjecture ready");
        if !cancellation.provide(&hyp) {
            return hyp;
        }

        match teacher.equivalence_query(&hyp, max_extra_states) {
            None => return hyp,
            Some(ce) => {
                for len in 1..=ce.len() {
                    let tail = ce[ce.len() - len..].to_vec();
                    if !pack.suffixes.contains(&tail) {
                        pack.suffixes.push(tail);
                    }
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
