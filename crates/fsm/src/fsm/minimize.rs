use std::collections::HashMap;

use fsm_core::{KindDescriptor, StateId, NULL_STATE};

use super::model::Dfsm;

impl Dfsm {
    /// Partitions states by behavioral equivalence and rebuilds `self`
    /// in place as the minimized, compact quotient. Returns the
    /// renaming `old state -> new state` (spec §3.2 invariant ii,
    /// §4.1). Idempotent: `minimize()` on an already-reduced FSM
    /// returns the identity map and leaves the FSM unchanged in shape.
    ///
    /// # Example
    /// ```
    /// use fsm::Dfsm;
    /// use fsm_core::MachineKind;
    ///
    /// // Two states, identical behavior on every input: should collapse to one.
    /// let mut m = Dfsm::create(2, 1, 1, MachineKind::Mealy);
    /// m.set_transition(0, 0, 1, Some(0)).unwrap();
    /// m.set_transition(1, 0, 0, Some(0)).unwrap();
    /// m.minimize();
    /// assert_eq!(m.num_states(), 1);
    /// ```
    pub fn minimize(&mut self) -> HashMap<StateId, StateId> {
        let n = self.num_states as usize;
        if n == 0 {
            return HashMap::new();
        }

        let mut block = if self.kind.is_output_state() {
            let mut map: HashMap<u32, u32> = HashMap::new();
            (0..n)
                .map(|s| {
                    let out = self.state_outputs[s];
                    let next_id = map.len() as u32;
                    *map.entry(out).or_insert(next_id)
                })
                .collect::<Vec<_>>()
        } else {
            vec![0u32; n]
        };

        loop {
            let mut signature_map: HashMap<(u32, Vec<u32>), u32> = HashMap::new();
            let mut new_block = vec![0u32; n];
            for s in 0..n {
                let mut key = Vec::with_capacity(self.num_inputs as usize * 2);
                for i in 0..self.num_inputs {
                    let t = self.transitions[s][i as usize];
                    if t == NULL_STATE {
                        key.push(u32::MAX);
                    } else {
                        key.push(block[t as usize]);
                    }
                    if self.kind.is_output_transition() {
                        key.push(self.transition_outputs[s][i as usize]);
                    }
                }
                let sig = (block[s], key);
                let next_id = signature_map.len() as u32;
                let id = *signature_map.entry(sig).or_insert(next_id);
                new_block[s] = id;
            }
            let converged = new_block.iter().collect::<std::collections::HashSet<_>>().len()
                == block.iter().collect::<std::collections::HashSet<_>>().len();
            block = new_block;
            if converged {
                break;
            }
        }

        let num_blocks = (block.iter().copied().max().unwrap() + 1) as usize;
        let mut block_repr: Vec<Option<u32>> = vec![None; num_blocks];
        for s in 0..n {
            let b = block[s] as usize;
            if block_repr[b].is_none() {
                block_repr[b] = Some(s as u32);
            }
        }
        let mut order: Vec<usize> = (0..num_blocks).collect();
        order.sort_by_key(|&b| block_repr[b].unwrap());
        let mut new_id_of_block = vec![0u32; num_blocks];
        for (new_id, &b) in order.iter().enumerate() {
            new_id_of_block[b] = new_id as u32;
        }

        let renaming: HashMap<StateId, StateId> = (0..n)
            .map(|s| (s as u32, new_id_of_block[block[s] as usize]))
            .collect();

        let mut new_transitions = vec![vec![NULL_STATE; self.num_inputs as usize]; num_blocks];
        let mut new_transition_outputs =
            vec![vec![fsm_core::DEFAULT_OUTPUT; self.num_inputs as usize]; num_blocks];
        let mut new_state_outputs = vec![fsm_core::DEFAULT_OUTPUT; num_blocks];

        for (&new_id, &old_repr) in new_id_of_block.iter().zip(block_repr.iter()).filter_map(
            |(new_id, repr)| repr.map(|r| (new_id, r)),
        ) {
            let old_repr = old_repr as usize;
            new_state_outputs[new_id as usize] = self.state_outputs[old_repr];
            for i in 0..self.num_inputs as usize {
                let t = self.transitions[old_repr][i];
                new_transitions[new_id as usize][i] = if t == NULL_STATE {
                    NULL_STATE
                } else {
                    renaming[&t]
                };
                new_transition_outputs[new_id as usize][i] = self.transition_outputs[old_repr][i];
            }
        }

        self.num_states = num_blocks as u32;
        self.transitions = new_transitions;
        self.transition_outputs = new_transition_outputs;
        self.state_outputs = new_state_outputs;

        renaming
    }

    /// Whether `self` is already reduced (minimize would not change its
    /// state count). Does not mutate `self`.
    pub fn is_reduced(&self) -> bool {
        let mut clone = self.clone();
        let before = clone.num_states;
        clone.minimize();
        clone.num_states == before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineKind;

    #[test]
    fn minimize_is_idempotent() {
        let mut m = Dfsm::create(3, 1, 1, MachineKind::Mealy);
        m.set_transition(0, 0, 1, Some(0)).unwrap();
        m.set_transition(1, 0, 2, Some(0)).unwrap();
        m.set_transition(2, 0, 0, Some(0)).unwrap();
        m.minimize();
        let first_size = m.num_states();
        m.minimize();
        assert_eq!(m.num_states(), first_size);
    }

    #[test]
    fn distinguishable_states_survive() {
        let mut m = Dfsm::create(2, 1, 2, MachineKind::Mealy);
        m.set_transition(0, 0, 0, Some(0)).unwrap();
        m.set_transition(1, 0, 1, Some(1)).unwrap();
        m.minimize();
        assert_eq!(m.num_states(), 2);
    }
}
