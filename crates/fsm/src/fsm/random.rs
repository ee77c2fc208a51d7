use rand::Rng;

use fsm_core::DEFAULT_OUTPUT;

use super::model::Dfsm;

impl Dfsm {
    /// A random FSM of the given shape (supplemented from
    /// `original_source/`'s test-generation helpers, not named by spec
    /// §4.1 directly): every `(state, input)` transition is present,
    /// targeting a uniformly random state, with outputs drawn
    /// uniformly from `0..num_outputs`. Useful for fuzzing the
    /// synthesis and learning algorithms against a known-complete
    /// machine; callers wanting partial transitions should punch holes
    /// in afterward.
    ///
    /// # Example
    /// ```
    /// use fsm::Dfsm;
    /// use fsm_core::MachineKind;
    ///
    /// let m = Dfsm::random(5, 2, 2, MachineKind::Mealy, &mut rand::thread_rng());
    /// assert_eq!(m.num_states(), 5);
    /// for s in m.states() {
    ///     for i in m.inputs() {
    ///         assert!(m.has_transition(s, i));
    ///     }
    /// }
    /// ```
    pub fn random(
        num_states: u32,
        num_inputs: u32,
        num_outputs: u32,
        kind: fsm_core::MachineKind,
        rng: &mut impl Rng,
    ) -> Self {
        let mut m = Dfsm::create(num_states, num_inputs, num_outputs, kind);
        if num_states == 0 {
            return m;
        }
        if kind.has_state_output() {
            for s in m.states().collect::<Vec<_>>() {
                let out = if num_outputs == 0 { DEFAULT_OUTPUT } else { rng.gen_range(0..num_outputs) };
                m.set_output(s, out, None).unwrap();
            }
        }
        for s in m.states().collect::<Vec<_>>() {
            for i in m.inputs().collect::<Vec<_>>() {
                let t = rng.gen_range(0..num_states);
                let out = if kind.has_transition_output() {
                    Some(if num_outputs == 0 { DEFAULT_OUTPUT } else { rng.gen_range(0..num_outputs) })
                } else {
                    None
                };
                m.set_transition(s, i, t, out).unwrap();
            }
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineKind;

    #[test]
    fn random_machine_is_total() {
        let mut rng = rand::thread_rng();
        let m = Dfsm::random(6, 3, 2, MachineKind::Dfsm, &mut rng);
        for s in m.states() {
            for i in m.inputs() {
                assert!(m.has_transition(s, i));
            }
        }
    }

    #[test]
    fn zero_states_is_empty() {
        let mut rng = rand::thread_rng();
        let m = Dfsm::random(0, 2, 2, MachineKind::Mealy, &mut rng);
        assert_eq!(m.num_states(), 0);
    }
}
