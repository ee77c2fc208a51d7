//! C3.1: pairwise shortest separating sequences (spec §4.3.1), plus the
//! two parallel variants sketched in spec §5.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use itertools::Itertools;

use fsm_core::{Input, KindDescriptor, STOUT_INPUT};

use crate::Dfsm;

use super::pair_index::{all_pairs, idx, num_pairs};

/// One backlink: a state pair `src` is separated by applying `input`
/// then whatever separates `dst` (spec §4.3.1 "link[(ns1,ns2)] +=
/// (idx(i,j), input)").
#[derive(Clone, Copy)]
struct Link {
    src: usize,
    input: Input,
}

fn direct_separator(m: &Dfsm, i: u32, j: u32) -> Option<Vec<Input>> {
    if m.kind().is_output_state() && m.get_state_output(i) != m.get_state_output(j) {
        return Some(vec![STOUT_INPUT]);
    }
    for a in m.inputs() {
        let hi = m.has_transition(i, a);
        let hj = m.has_transition(j, a);
        if hi != hj {
            return Some(vec![a]);
        }
        if hi && hj && m.get_output(i, a) != m.get_output(j, a) {
            return Some(vec![a]);
        }
    }
    None
}

fn prepend(
    m: &Dfsm,
    a: Input,
    rest: &[Input],
    omit_unnecessary_stout_inputs: bool,
) -> Vec<Input> {
    let mut out = Vec::with_capacity(rest.len() + 2);
    out.push(a);
    if !omit_unnecessary_stout_inputs
        && m.kind().is_output_state()
        && rest.first() != Some(&STOUT_INPUT)
    {
        out.push(STOUT_INPUT);
    }
    out.extend_from_slice(rest);
    out
}

/// Computes `seq[idx(i,j)]` for every state pair: a shortest input
/// sequence such that `get_output_along_path(m, i, seq) !=
/// get_output_along_path(m, j, seq)`. A pair whose entry is empty is
/// behaviorally equivalent — `m` is not reduced.
///
/// # Example
/// ```
/// use fsm::Dfsm;
/// use fsm::sequence::separating::shortest_separating_sequences;
/// use fsm::sequence::pair_index::idx;
/// use fsm_core::MachineKind;
///
/// let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
/// m.set_transition(0, 0, 0, Some(0)).unwrap();
/// m.set_transition(0, 1, 1, Some(0)).unwrap();
/// m.set_transition(1, 0, 0, Some(0)).unwrap();
/// m.set_transition(1, 1, 1, Some(1)).unwrap();
/// let seq = shortest_separating_sequences(&m, true);
/// assert_eq!(seq[idx(0, 1)], vec![1]);
/// ```
pub fn shortest_separating_sequences(m: &Dfsm, omit_unnecessary_stout_inputs: bool) -> Vec<Vec<Input>> {
    let n = m.num_states();
    let np = num_pairs(n);
    let mut seq: Vec<Option<Vec<Input>>> = vec![None; np];
    let mut links: Vec<Vec<Link>> = vec![Vec::new(); np];
    let mut queue = std::collections::VecDeque::new();

    for (i, j) in all_pairs(n) {
        let k = idx(i, j);
        if let Some(s) = direct_separator(m, i, j) {
            seq[k] = Some(s);
            queue.push_back(k);
        }
    }

    for (i, j) in all_pairs(n) {
        let k = idx(i, j);
        if seq[k].is_some() {
            continue;
        }
        for a in m.inputs() {
            let ni = m.get_next_state(i, a);
            let nj = m.get_next_state(j, a);
            if ni != nj {
                links[idx(ni, nj)].push(Link { src: k, input: a });
            }
        }
    }

    while let Some(k) = queue.pop_front() {
        let rest = seq[k].clone().unwrap();
        for link in links[k].clone() {
            if seq[link.src].is_some() {
                continue;
            }
            let s = prepend(m, link.input, &rest, omit_unnecessary_stout_inputs);
            seq[link.src] = Some(s);
            queue.push_back(link.src);
        }
    }

    seq.into_iter().map(|o| o.unwrap_or_default()).collect()
}

/// Parallel variant (spec §5): classifies the direct-separation
/// frontier across threads, then propagates backlinks through a
/// shared queue guarded by per-pair atomic "already assigned" flags.
/// Produces separating sequences of the *same lengths* as
/// [`shortest_separating_sequences`] for every pair; when several
/// inputs tie for the shortest separator of a pair, thread scheduling
/// may pick a different (equally short) one than the sequential
/// algorithm would (documented simplification — see `DESIGN.md`).
pub fn shortest_separating_sequences_parallel(
    m: &Dfsm,
    omit_unnecessary_stout_inputs: bool,
    threads: usize,
) -> Vec<Vec<Input>> {
    let n = m.num_states();
    let np = num_pairs(n);
    let pairs: Vec<(u32, u32)> = all_pairs(n).collect_vec();
    let threads = threads.max(1);

    let direct: Mutex<Vec<Option<Vec<Input>>>> = Mutex::new(vec![None; np]);
    std::thread::scope(|scope| {
        for chunk in pairs.chunks(pairs.len().div_ceil(threads).max(1)) {
            let direct = &direct;
            scope.spawn(move || {
                let mut local = Vec::new();
                for &(i, j) in chunk {
                    if let Some(s) = direct_separator(m, i, j) {
                        local.push((idx(i, j), s));
                    }
                }
                let mut guard = direct.lock().unwrap();
                for (k, s) in local {
                    guard[k] = Some(s);
                }
            });
        }
    });
    let seq_slots: Vec<Option<Vec<Input>>> = direct.into_inner().unwrap();

    let assigned: Vec<AtomicBool> = seq_slots.iter().map(|s| AtomicBool::new(s.is_some())).collect();
    let seq: Vec<Mutex<Option<Vec<Input>>>> = seq_slots.into_iter().map(Mutex::new).collect();

    let mut links: Vec<Vec<Link>> = vec![Vec::new(); np];
    for (i, j) in pairs.iter().copied() {
        let k = idx(i, j);
        if assigned[k].load(Ordering::SeqCst) {
            continue;
        }
        for a in m.inputs() {
            let ni = m.get_next_state(i, a);
            let nj = m.get_next_state(j, a);
            if ni != nj {
                links[idx(ni, nj)].push(Link { src: k, input: a });
            }
        }
    }

    let (tx, rx) = crossbeam_channel::unbounded::<usize>();
    for k in 0..np {
        if assigned[k].load(Ordering::SeqCst) {
            tx.send(k).unwrap();
        }
    }

    std::thread::scope(|scope| {
        for _ in 0..threads {
            let rx = rx.clone();
            let tx = tx.clone();
            let seq = &seq;
            let assigned = &assigned;
            let links = &links;
            scope.spawn(move || {
                while let Ok(k) = rx.recv_timeout(std::time::Duration::from_millis(20)) {
                    let rest = seq[k].lock().unwrap().clone().unwrap();
                    for link in &links[k] {
                        if assigned[link.src]
                            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                            .is_ok()
                        {
                            let s = prepend(m, link.input, &rest, omit_unnecessary_stout_inputs);
                            *seq[link.src].lock().unwrap() = Some(s);
                            tx.send(link.src).unwrap();
                        }
                    }
                }
            });
        }
        drop(tx);
    });

    seq.into_iter()
        .map(|m| m.into_inner().unwrap().unwrap_or_default())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineKind;

    fn two_state_mealy() -> Dfsm {
        let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
        m.set_transition(0, 0, 0, Some(0)).unwrap();
        m.set_transition(0, 1, 1, Some(0)).unwrap();
        m.set_transition(1, 0, 0, Some(0)).unwrap();
        m.set_transition(1, 1, 1, Some(1)).unwrap();
        m
    }

    #[test]
    fn separates_every_reduced_pair() {
        let m = two_state_mealy();
        let seq = shortest_separating_sequences(&m, true);
        for (i, j) in all_pairs(m.num_states()) {
            let s = &seq[idx(i, j)];
            assert!(!s.is_empty());
            assert_ne!(
                m.get_output_along_path(i, s),
                m.get_output_along_path(j, s)
            );
        }
    }

    #[test]
    fn parallel_matches_sequential_lengths() {
        let m = two_state_mealy();
        let seq = shortest_separating_sequences(&m, true);
        let par = shortest_separating_sequences_parallel(&m, true, 4);
        for (i, j) in all_pairs(m.num_states()) {
            assert_eq!(seq[idx(i, j)].len(), par[idx(i, j)].len());
            let s = &par[idx(i, j)];
            assert_ne!(
                m.get_output_along_path(i, s),
                m.get_output_along_path(j, s)
            );
        }
    }
}
