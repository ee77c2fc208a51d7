//! L*, the observation-table family (spec §4.6.1).

use std::collections::HashMap;

use fsm::Dfsm;
use fsm_core::{Input, MachineKind, Output, STOUT_INPUT};
use tracing::{debug, trace};

use crate::blackbox::{BlackBox, Teacher};
use crate::learn::{NoCancellation, TentativeModelSink};

/// Counterexample-processing policy (spec §4.6.1 table). All five
/// produce an unclosed table without double-counting suffixes already
/// in `E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterexampleProcessing {
    AllPrefixes,
    BinarySearch,
    SuffixAfterLastState,
    AllSuffixesAfterLastState,
    Suffix1By1,
}

struct ObservationTable {
    s: Vec<Vec<Input>>,
    e: Vec<Vec<Input>>,
    /// `row[p]` = one output per suffix in `e`, the last output symbol
    /// observed when querying `p ++ e[k]` from the initial state.
    rows: HashMap<Vec<Input>, Vec<Output>>,
}

impl ObservationTable {
    fn new() -> Self {
        ObservationTable { s: vec![Vec::new()], e: Vec::new(), rows: HashMap::new() }
    }

    fn prefixes_needing_rows(&self, num_inputs: u32) -> Vec<Vec<Input>> {
        let mut needed = Vec::new();
        for s in &self.s {
            if !self.rows.contains_key(s) {
                needed.push(s.clone());
            }
            for i in 0..num_inputs {
                let mut si = s.clone();
                si.push(i);
                if !self.rows.contains_key(&si) {
                    needed.push(si);
                }
            }
        }
        needed
    }

    fn fill_rows<B: BlackBox>(&mut self, teacher: &Teacher<B>, prefixes: Vec<Vec<Input>>) {
        for p in prefixes {
            let row = self.compute_row(teacher, &p);
            self.rows.insert(p, row);
        }
    }

    fn compute_row<B: BlackBox>(&self, teacher: &Teacher<B>, p: &[Input]) -> Vec<Output> {
        self.e
            .iter()
            .map(|suffix| {
                let mut seq = p.to_vec();
                seq.extend_from_slice(suffix);
                let trace = teacher.output_query_full_trace(&seq).expect("reset always succeeds");
                *trace.last().expect("suffix queries are never empty")
            })
            .collect()
    }

    fn row(&self, p: &[Input]) -> &[Output] {
        self.rows.get(p).expect("row must be filled before lookup")
    }

    fn s_index_with_same_row(&self, p: &[Input]) -> Option<usize> {
        self.s.iter().position(|s| self.row(s) == self.row(p))
    }

    fn find_unclosed(&self, num_inputs: u32) -> Option<Vec<Input>> {
        for s in &self.s {
            for i in 0..num_inputs {
                let mut si = s.clone();
                si.push(i);
                if self.s_index_with_same_row(&si).is_none() {
                    return Some(si);
                }
            }
        }
        None
    }

    /// Returns `(s1, s2, i, e)` where rows of `s1` and `s2` agree but
    /// `s1·i` and `s2·i` diverge at suffix `e`.
    fn find_inconsistent(&self, num_inputs: u32) -> Option<(Vec<Input>, Vec<Input>, Input, Vec<Input>)> {
        for a in 0..self.s.len() {
            for b in (a + 1)..self.s.len() {
                if self.row(&self.s[a]) != self.row(&self.s[b]) {
                    continue;
                }
                for i in 0..num_inputs {
                    let mut s1i = self.s[a].clone();
                    s1i.push(i);
                    let mut s2i = self.s[b].clone();
                    s2i.push(i);
                    let (r1, r2) = (self.row(&s1i), self.row(&s2i));
                    if r1 != r2 {
                        for (k, e) in self.e.iter().enumerate() {
                            if r1[k] != r2[k] {
                                return Some((self.s[a].clone(), self.s[b].clone(), i, e.clone()));
                            }
                        }
                    }
                }
            }
        }
        None
    }

    fn access_string_with_same_row<B: BlackBox>(&self, teacher: &Teacher<B>, target: &[Input]) -> Vec<Input> {
        let target_row = self.compute_row(teacher, target);
        self.s
            .iter()
            .find(|s| self.row(s) == target_row)
            .cloned()
            .unwrap_or_else(|| target.to_vec())
    }

    fn build_hypothesis<B: BlackBox>(
        &self,
        teacher: &Teacher<B>,
        kind: MachineKind,
        num_inputs: u32,
        num_outputs: u32,
    ) -> Dfsm {
        let mut reps: Vec<Vec<Input>> = Vec::new();
        let mut row_to_state: HashMap<Vec<Output>, usize> = HashMap::new();
        for s in &self.s {
            let row = self.row(s).to_vec();
            if !row_to_state.contains_key(&row) {
                row_to_state.insert(row, reps.len());
                reps.push(s.clone());
            }
        }
        let mut m = Dfsm::create(reps.len() as u32, num_inputs, num_outputs, kind);
        for (state, access) in reps.iter().enumerate() {
            for i in 0..num_inputs {
                let mut si = access.clone();
                si.push(i);
                let target_row = self.row(&si).to_vec();
                let target = *row_to_state
                    .get(&target_row)
                    .expect("every s·i row matches some S row once the table is closed");
                let out = if kind.has_transition_output() {
                    let trace = teacher.output_query_full_trace(&si).expect("reset always succeeds");
                    *trace.last().expect("non-empty sequence")
                } else {
                    0
                };
                m.set_transition(state as u32, i, target as u32, Some(out)).expect("valid indices");
            }
        }
        m
    }

    fn refresh_state_outputs<B: BlackBox>(&self, teacher: &Teacher<B>, m: &mut Dfsm, reps: &[Vec<Input>]) {
        if !m.kind().has_state_output() {
            return;
        }
        for (state, access) in reps.iter().enumerate() {
            let mut seq = access.clone();
            seq.push(STOUT_INPUT);
            let trace = teacher.output_query_full_trace(&seq).expect("reset always succeeds");
            let out = *trace.last().expect("non-empty sequence");
            m.set_output(state as u32, out, None).expect("valid state index");
        }
    }

    fn representatives(&self) -> Vec<Vec<Input>> {
        let mut reps: Vec<Vec<Input>> = Vec::new();
        let mut seen_rows: Vec<Vec<Output>> = Vec::new();
        for s in &self.s {
            let row = self.row(s).to_vec();
            if !seen_rows.contains(&row) {
                seen_rows.push(row);
                reps.push(s.clone());
            }
        }
        reps
    }

    fn add_suffix_closed(&mut self, suffix: Vec<Input>) {
        for len in 1..=suffix.len() {
            let tail = suffix[suffix.len() - len..].to_vec();
            if !self.e.contains(&tail) {
                self.e.push(tail);
            }
        }
    }

    fn ensure_suffix_closure(&mut self) {
        let mut idx = 0;
        while idx < self.e.len() {
            if self.e[idx].len() > 1 {
                let tail = self.e[idx][1..].to_vec();
                if !self.e.contains(&tail) {
                    self.e.push(tail);
                }
            }
            idx += 1;
        }
    }
}

fn longest_prefix_in_s(ce: &[Input], table: &ObservationTable) -> usize {
    for len in (0..=ce.len()).rev() {
        if table.s.contains(&ce[..len].to_vec()) {
            return len;
        }
    }
    0
}

fn binary_search_breakpoint<B: BlackBox>(
    teacher: &Teacher<B>,
    table: &ObservationTable,
    hyp: &Dfsm,
    ce: &[Input],
) -> Vec<Input> {
    let n = ce.len();
    let mut lo = 0usize;
    let mut hi = n;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        let access = table.access_string_with_same_row(teacher, &ce[..mid]);
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
    ce[hi..].to_vec()
}

/// Learns a conjecture by repeatedly closing/consistentifying an
/// observation table and processing counterexamples with `policy`
/// (spec §4.6.1). `max_extra_states` bounds the opaque-box equivalence
/// fallback (spec §4.5).
pub fn learn<B: BlackBox>(
    teacher: &Teacher<B>,
    policy: CounterexampleProcessing,
    check_semantic_suffix_closedness: bool,
    max_extra_states: u32,
) -> Dfsm {
    learn_with_cancellation(teacher, policy, check_semantic_suffix_closedness, max_extra_states, &mut NoCancellation)
}

pub fn learn_with_cancellation<B: BlackBox>(
    teacher: &Teacher<B>,
    policy: CounterexampleProcessing,
    check_semantic_suffix_closedness: bool,
    max_extra_states: u32,
    cancellation: &mut dyn TentativeModelSink,
) -> Dfsm {
    let kind = teacher.black_box().model_kind();
    let num_inputs = teacher.num_inputs();
    let num_outputs = teacher.num_outputs();

    let mut table = ObservationTable::new();
    for i in 0..num_inputs {
        table.e.push(vec![i]);
    }

    loop {
        loop {
            let needed = table.prefixes_needing_rows(num_inputs);
            table.fill_rows(teacher, needed);

            if let Some(unclosed) = table.find_unclosed(num_inputs) {
                trace!(?unclosed, "L* table unclosed, promoting to S");
                table.s.push(unclosed);
                continue;
            }
            if let Some((_s1, _s2, i, e)) = table.find_inconsistent(num_inputs) {
                let mut suffix = vec![i];
                suffix.extend_from_slice(&e);
                debug!(?suffix, "L* table inconsistent, enlarging E");
                table.e.push(suffix);
                continue;
            }
            if check_semantic_suffix_closedness {
                let before = table.e.len();
                table.ensure_suffix_closure();
                if table.e.len() != before {
                    continue;
                }
            }
            break;
        }

        let reps = table.representatives();
        let mut hyp = table.build_hypothesis(teacher, kind, num_inputs, num_outputs);
        table.refresh_state_outputs(teacher, &mut hyp, &reps);

        debug!(states = hyp.num_states(), "L* conjecture ready");
        if !cancellation.provide(&hyp) {
            return hyp;
        }

        match teacher.equivalence_query(&hyp, max_extra_states) {
            None => return hyp,
            Some(ce) => {
                debug!(?ce, ?policy, "L* processing counterexample");
                match policy {
                    CounterexampleProcessing::AllPrefixes => {
                        for len in 1..=ce.len() {
                            let p = ce[..len].to_vec();
                            if !table.s.contains(&p) {
                                table.s.push(p);
                            }
                        }
                    }
                    CounterexampleProcessing::BinarySearch => {
                        let suffix = binary_search_breakpoint(teacher, &table, &hyp, &ce);
                        table.add_suffix_closed(suffix);
                    }
                    CounterexampleProcessing::SuffixAfterLastState => {
                        let len = longest_prefix_in_s(&ce, &table);
                        table.e.push(ce[len..].to_vec());
                    }
                    CounterexampleProcessing::AllSuffixesAfterLastState => {
                        let len = longest_prefix_in_s(&ce, &table);
                        table.add_suffix_closed(ce[len..].to_vec());
                    }
                    CounterexampleProcessing::Suffix1By1 => {
                        for len in 1..=ce.len() {
                            let tail = ce[ce.len() - len..].to_vec();
                            if !table.e.contains(&tail) {
                                table.e.push(tail);
                            }
                        }
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

    fn assert_equivalent(reference: &Dfsm, hyp: &Dfsm) {
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        assert!(teacher.equivalence_query(hyp, 0).is_none(), "hypothesis disagrees with reference");
    }

    #[test]
    fn all_prefixes_policy_converges() {
        let reference = two_state_mealy();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let hyp = learn(&teacher, CounterexampleProcessing::AllPrefixes, false, 2);
        assert_equivalent(&reference, &hyp);
    }

    #[test]
    fn binary_search_policy_converges() {
        let reference = two_state_mealy();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let hyp = learn(&teacher, CounterexampleProcessing::BinarySearch, false, 2);
        assert_equivalent(&reference, &hyp);
    }

    #[test]
    fn suffix_after_last_state_policy_converges() {
        let reference = two_state_mealy();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let hyp = learn(&teacher, CounterexampleProcessing::SuffixAfterLastState, false, 2);
        assert_equivalent(&reference, &hyp);
    }

    #[test]
    fn all_suffixes_after_last_state_policy_converges() {
        let reference = two_state_mealy();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let hyp = learn(&teacher, CounterexampleProcessing::AllSuffixesAfterLastState, false, 2);
        assert_equivalent(&reference, &hyp);
    }

    #[test]
    fn suffix_1_by_1_policy_converges() {
        let reference = two_state_mealy();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let hyp = learn(&teacher, CounterexampleProcessing::Suffix1By1, false, 2);
        assert_equivalent(&reference, &hyp);
    }

    #[test]
    fn semantic_suffix_closedness_still_converges() {
        let reference = two_state_mealy();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let hyp = learn(&teacher, CounterexampleProcessing::AllPrefixes, true, 2);
        assert_equivalent(&reference, &hyp);
    }

    #[test]
    fn three_state_machine_converges() {
        let mut reference = Dfsm::create(3, 2, 2, MachineKind::Mealy);
        reference.set_transition(0, 0, 1, Some(0)).unwrap();
        reference.set_transition(0, 1, 0, Some(0)).unwrap();
        reference.set_transition(1, 0, 2, Some(0)).unwrap();
        reference.set_transition(1, 1, 0, Some(1)).unwrap();
        reference.set_transition(2, 0, 2, Some(1)).unwrap();
        reference.set_transition(2, 1, 1, Some(1)).unwrap();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let hyp = learn(&teacher, CounterexampleProcessing::BinarySearch, false, 3);
        assert_equivalent(&reference, &hyp);
    }

    #[test]
    fn cancellation_returns_first_conjecture() {
        let reference = two_state_mealy();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference), false);
        let mut calls = 0;
        let mut sink = |_: &Dfsm| {
            calls += 1;
            false
        };
        let hyp = learn_with_cancellation(&teacher, CounterexampleProcessing::AllPrefixes, false, 2, &mut sink);
        assert_eq!(calls, 1);
        assert_eq!(hyp.num_states(), 1);
    }
}
