//! C3.6: state cover, transition cover, and the bounded traversal set
//! used to build the "tail" of W/Wp-style test suites (spec §4.3.6).

use std::collections::VecDeque;

use fsm_core::{Input, StateId};

use crate::Dfsm;

/// Shortest sequence reaching every state from state 0, via BFS. Index
/// `s` holds the sequence that reaches state `s` (empty for state 0
/// itself). A state unreachable from 0 gets `None`.
///
/// # Example
/// ```
/// use fsm::Dfsm;
/// use fsm::sequence::covers::state_cover;
/// use fsm_core::MachineKind;
///
/// let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
/// m.set_transition(0, 0, 0, Some(0)).unwrap();
/// m.set_transition(0, 1, 1, Some(0)).unwrap();
/// m.set_transition(1, 0, 0, Some(0)).unwrap();
/// m.set_transition(1, 1, 1, Some(1)).unwrap();
/// let cover = state_cover(&m);
/// assert_eq!(cover[0], Some(Vec::new()));
/// assert_eq!(cover[1], Some(vec![1]));
/// ```
pub fn state_cover(m: &Dfsm) -> Vec<Option<Vec<Input>>> {
    let n = m.num_states() as usize;
    let mut cover: Vec<Option<Vec<Input>>> = vec![None; n];
    if n == 0 {
        return cover;
    }
    cover[0] = Some(Vec::new());
    let mut queue = VecDeque::new();
    queue.push_back(0u32);
    while let Some(s) = queue.pop_front() {
        let prefix = cover[s as usize].clone().unwrap();
        for a in m.inputs() {
            let t = m.get_next_state(s, a);
            if t as usize >= n || cover[t as usize].is_some() {
                continue;
            }
            let mut seq = prefix.clone();
            seq.push(a);
            cover[t as usize] = Some(seq);
            queue.push_back(t);
        }
    }
    cover
}

/// The state cover extended by every input symbol, so every defined
/// transition is exercised at least once. One entry per `(state,
/// input)` with both reachable.
pub fn transition_cover(m: &Dfsm) -> Vec<Vec<Input>> {
    let cover = state_cover(m);
    let mut out = Vec::new();
    for s in m.states() {
        let Some(prefix) = &cover[s as usize] else { continue };
        for a in m.inputs() {
            let mut seq = prefix.clone();
            seq.push(a);
            out.push(seq);
        }
    }
    out
}

/// Every input sequence of length `0..=extra_states`, in
/// shortest-first order — the tail appended to the transition cover in
/// W-style test suites to probe for extra, unmodeled states (spec
/// §4.4).
///
/// # Example
/// ```
/// use fsm::Dfsm;
/// use fsm::sequence::covers::traversal_set;
/// use fsm_core::MachineKind;
///
/// let m = Dfsm::create(1, 2, 1, MachineKind::Mealy);
/// let t = traversal_set(&m, 1);
/// assert!(t.contains(&Vec::new()));
/// assert!(t.contains(&vec![0]));
/// assert!(t.contains(&vec![1]));
/// assert_eq!(t.len(), 3);
/// ```
pub fn traversal_set(m: &Dfsm, extra_states: u32) -> Vec<Vec<Input>> {
    let mut out = vec![Vec::new()];
    let mut frontier = vec![Vec::new()];
    for _ in 0..extra_states {
        let mut next = Vec::new();
        for prefix in &frontier {
            for a in m.inputs() {
                let mut seq = prefix.clone();
                seq.push(a);
                out.push(seq.clone());
                next.push(seq);
            }
        }
        frontier = next;
    }
    out
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
    fn state_cover_reaches_every_state() {
        let m = two_state_mealy();
        let cover = state_cover(&m);
        for s in m.states() {
            let seq = cover[s as usize].as_ref().unwrap();
            assert_eq!(m.get_end_path_state(0, seq), s);
        }
    }

    #[test]
    fn transition_cover_exercises_every_transition() {
        let m = two_state_mealy();
        let cover = transition_cover(&m);
        for s in m.states() {
            for a in m.inputs() {
                assert!(cover.iter().any(|seq| {
                    !seq.is_empty()
                        && seq[seq.len() - 1] == a
                        && m.get_end_path_state(0, &seq[..seq.len() - 1]) == s
                }));
            }
        }
    }

    #[test]
    fn unreachable_state_has_no_cover_entry() {
        let mut m = two_state_mealy();
        let orphan = m.add_state(None);
        let cover = state_cover(&m);
        assert!(cover[orphan as usize].is_none());
    }
}
