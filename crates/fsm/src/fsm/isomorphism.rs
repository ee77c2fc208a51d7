use std::collections::{HashMap, VecDeque};

use fsm_core::{KindDescriptor, NULL_STATE};

use super::model::Dfsm;

impl Dfsm {
    /// Whether `self` and `other` are isomorphic: there is a bijection
    /// on states, rooted at state 0 of each, preserving the transition
    /// function and every output (spec §4.1). Implemented as a
    /// simultaneous BFS from the two initial states, failing on the
    /// first divergence — this assumes both machines are connected
    /// (spec §8's invariants are stated "for all FSM M in the
    /// reduced-and-compact cohort", which are always connected after
    /// `minimize`).
    ///
    /// # Example
    /// ```
    /// use fsm::Dfsm;
    /// use fsm_core::MachineKind;
    ///
    /// let m = Dfsm::create(1, 1, 1, MachineKind::Mealy);
    /// assert!(m.are_isomorphic(&m));
    /// ```
    pub fn are_isomorphic(&self, other: &Dfsm) -> bool {
        if self.kind != other.kind
            || self.num_inputs != other.num_inputs
            || self.num_states != other.num_states
        {
            return false;
        }
        if self.num_states == 0 {
            return true;
        }

        let mut a_to_b: HashMap<u32, u32> = HashMap::new();
        let mut b_to_a: HashMap<u32, u32> = HashMap::new();
        a_to_b.insert(0, 0);
        b_to_a.insert(0, 0);
        let mut queue = VecDeque::new();
        queue.push_back((0u32, 0u32));

        while let Some((a, b)) = queue.pop_front() {
            if self.kind.is_output_state() && self.get_state_output(a) != other.get_state_output(b)
            {
                return false;
            }
            for i in 0..self.num_inputs {
                let ta = self.get_next_state(a, i);
                let tb = other.get_next_state(b, i);
                if (ta == NULL_STATE) != (tb == NULL_STATE) {
                    return false;
                }
                if ta == NULL_STATE {
                    continue;
                }
                if self.kind.is_output_transition() && self.get_output(a, i) != other.get_output(b, i)
                {
                    return false;
                }
                match (a_to_b.get(&ta), b_to_a.get(&tb)) {
                    (Some(&mapped_b), Some(&mapped_a)) => {
                        if mapped_b != tb || mapped_a != ta {
                            return false;
                        }
                    }
                    (None, None) => {
                        a_to_b.insert(ta, tb);
                        b_to_a.insert(tb, ta);
                        queue.push_back((ta, tb));
                    }
                    _ => return false,
                }
            }
        }

        a_to_b.len() == self.num_states as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineKind;

    #[test]
    fn reflexive() {
        let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
        m.set_transition(0, 0, 0, Some(0)).unwrap();
        m.set_transition(0, 1, 1, Some(0)).unwrap();
        m.set_transition(1, 0, 0, Some(0)).unwrap();
        m.set_transition(1, 1, 1, Some(1)).unwrap();
        assert!(m.are_isomorphic(&m));
    }

    #[test]
    fn relabeling_is_isomorphic() {
        let mut a = Dfsm::create(2, 1, 1, MachineKind::Mealy);
        a.set_transition(0, 0, 1, Some(0)).unwrap();
        a.set_transition(1, 0, 0, Some(1)).unwrap();

        let mut b = Dfsm::create(2, 1, 1, MachineKind::Mealy);
        b.set_transition(0, 0, 1, Some(0)).unwrap();
        b.set_transition(1, 0, 0, Some(1)).unwrap();

        assert!(a.are_isomorphic(&b));
    }

    #[test]
    fn different_outputs_not_isomorphic() {
        let mut a = Dfsm::create(2, 1, 2, MachineKind::Mealy);
        a.set_transition(0, 0, 1, Some(0)).unwrap();
        a.set_transition(1, 0, 0, Some(0)).unwrap();

        let mut b = Dfsm::create(2, 1, 2, MachineKind::Mealy);
        b.set_transition(0, 0, 1, Some(0)).unwrap();
        b.set_transition(1, 0, 0, Some(1)).unwrap();

        assert!(!a.are_isomorphic(&b));
    }
}
