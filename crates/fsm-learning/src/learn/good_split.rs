//! GoodSplit (spec §4.6.7): samples distinguishing sequences of
//! increasing length and greedily applies the one that best partitions
//! an ambiguous group of candidate states. Used when equivalence
//! queries are restricted or absent — there is no EQ anywhere here.

use std::collections::HashMap;

use rand::Rng;

use fsm::Dfsm;
use fsm_core::{Input, MachineKind, Output, STOUT_INPUT};
use tracing::debug;

use crate::blackbox::{BlackBox, Teacher};

fn sample_sequences(len: usize, count: usize, num_inputs: u32, rng: &mut impl Rng) -> Vec<Vec<Input>> {
    (0..count).map(|_| (0..len).map(|_| rng.gen_range(0..num_inputs)).collect()).collect()
}

fn row<B: BlackBox>(teacher: &Teacher<B>, access: &[Input], suffixes: &[Vec<Input>]) -> Vec<Output> {
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

fn expand_frontier<B: BlackBox>(teacher: &Teacher<B>, reps: &mut Vec<Vec<Input>>, distinguishers: &[Vec<Input>], num_inputs: u32) {
    loop {
        let rep_rows: Vec<Vec<Output>> = reps.iter().map(|a| row(teacher, a, distinguishers)).collect();
        let mut new_reps = Vec::new();
        for access in reps.clone() {
            for i in 0..num_inputs {
                let mut succ = access.clone();
                succ.push(i);
                let r = row(teacher, &succ, distinguishers);
                let known = rep_rows.contains(&r) || new_reps.iter().any(|(rr, _): &(Vec<Output>, Vec<Input>)| *rr == r);
                if !known {
                    new_reps.push((r, succ));
                }
            }
        }
        if new_reps.is_empty() {
            break;
        }
        reps.extend(new_reps.into_iter().map(|(_, access)| access));
    }
}

fn build_hypothesis<B: BlackBox>(
    teacher: &Teacher<B>,
    reps: &[Vec<Input>],
    distinguishers: &[Vec<Input>],
    kind: MachineKind,
    num_inputs: u32,
    num_outputs: u32,
) -> Dfsm {
    let rows: Vec<Vec<Output>> = reps.iter().map(|a| row(teacher, a, distinguishers)).collect();
    let mut class_reps: Vec<usize> = Vec::new();
    let mut class_of: HashMap<usize, usize> = HashMap::new();
    for (idx, r) in rows.iter().enumerate() {
        let class = class_reps.iter().position(|&ci| rows[ci] == *r).unwrap_or_else(|| {
            class_reps.push(idx);
            class_reps.len() - 1
        });
        class_of.insert(idx, class);
    }

    let mut m = Dfsm::create(class_reps.len() as u32, num_inputs, num_outputs, kind);
    for (state, &rep_idx) in class_reps.iter().enumerate() {
        let access = &reps[rep_idx];
        for i in 0..num_inputs {
            let mut succ = access.clone();
            succ.push(i);
            let succ_row = row(teacher, &succ, distinguishers);
            let target = class_reps
                .iter()
                .position(|&ci| rows[ci] == succ_row)
                .unwrap_or(0) as u32;
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

/// Learns without equivalence queries, sampling increasingly long
/// distinguishing sequences until either the candidate partition
/// stabilizes or `max_distinguishing_length` is exceeded.
pub fn learn<B: BlackBox>(
    teacher: &Teacher<B>,
    max_distinguishing_length: usize,
    pool_size: usize,
    rng: &mut impl Rng,
) -> Dfsm {
    let kind = teacher.black_box().model_kind();
    let num_inputs = teacher.num_inputs();
    let num_outputs = teacher.num_outputs();

    let mut distinguishers: Vec<Vec<Input>> = Vec::new();
    let mut pool = sample_sequences(1, pool_size, num_inputs, rng);
    let mut applied_count = 0usize;
    let mut len = 1usize;
    let mut reps: Vec<Vec<Input>> = vec![Vec::new()];

    loop {
        expand_frontier(teacher, &mut reps, &distinguishers, num_inputs);

        let rows: Vec<Vec<Output>> = reps.iter().map(|a| row(teacher, a, &distinguishers)).collect();
        let mut groups: HashMap<Vec<Output>, Vec<usize>> = HashMap::new();
        for (idx, r) in rows.iter().enumerate() {
            groups.entry(r.clone()).or_default().push(idx);
        }
        let target_group = groups.values().filter(|g| g.len() > 1).max_by_key(|g| g.len());

        let Some(target_group) = target_group else {
            debug!(states = reps.len(), "GoodSplit partition stable");
            break;
        };

        if pool.is_empty() {
            len += 1;
            if len > max_distinguishing_length {
                debug!(len, "GoodSplit exhausted max distinguishing length with ambiguity remaining");
                break;
            }
            pool = sample_sequences(len, pool_size, num_inputs, rng);
            applied_count = 0;
            continue;
        }

        let mut best: Option<(usize, usize, usize)> = None;
        for (pi, cand) in pool.iter().enumerate() {
            let mut buckets: HashMap<Output, usize> = HashMap::new();
            for &idx in target_group {
                let mut w = reps[idx].clone();
                w.extend_from_slice(cand);
                let trace = teacher.output_query_full_trace(&w).expect("reset always succeeds");
                let out = *trace.last().expect("non-empty");
                *buckets.entry(out).or_insert(0) += 1;
            }
            let distinct = buckets.len();
            let max_residue = *buckets.values().max().unwrap_or(&0);
            let better = match best {
                None => true,
                Some((_, best_distinct, best_residue)) => {
                    distinct > best_distinct || (distinct == best_distinct && max_residue < best_residue)
                }
            };
            if better {
                best = Some((pi, distinct, max_residue));
            }
        }

        let (pi, distinct, _) = best.expect("pool is non-empty here");
        let chosen = pool.remove(pi);
        if distinct > 1 {
            debug!(?chosen, distinct, "GoodSplit applied a distinguishing sequence");
            distinguishers.push(chosen);
        }
        applied_count += 1;

        if (applied_count as f64) >= 0.9 * (pool.len() + applied_count) as f64 {
            len += 1;
            if len > max_distinguishing_length {
                break;
            }
            let fresh = sample_sequences(len, pool_size, num_inputs, rng);
            pool.extend(fresh);
            applied_count = 0;
        }
    }

    build_hypothesis(teacher, &reps, &distinguishers, kind, num_inputs, num_outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackbox::ModelBackedBlackBox;
    use rand::SeedableRng;

    fn two_state_mealy() -> Dfsm {
        let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
        m.set_transition(0, 0, 0, Some(0)).unwrap();
        m.set_transition(0, 1, 1, Some(0)).unwrap();
        m.set_transition(1, 0, 0, Some(0)).unwrap();
        m.set_transition(1, 1, 1, Some(1)).unwrap();
        m
    }

    #[test]
    fn separates_the_two_states_given_enough_pool() {
        let reference = two_state_mealy();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let hyp = learn(&teacher, 4, 8, &mut rng);
        let verify = Teacher::new(ModelBackedBlackBox::new(reference), false);
        assert!(verify.equivalence_query(&hyp, 0).is_none());
    }

    #[test]
    fn tiny_pool_still_terminates() {
        let reference = two_state_mealy();
        let teacher = Teacher::new(ModelBackedBlackBox::new(reference), false);
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let hyp = learn(&teacher, 1, 1, &mut rng);
        assert!(hyp.num_states() >= 1);
    }
}
