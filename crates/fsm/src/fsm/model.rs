use fsm_core::{FsmError, Input, MachineKind, Output, StateId, KindDescriptor, MAX_DENSE_RANGE};
use fsm_core::{DEFAULT_OUTPUT, NULL_STATE, STOUT_INPUT};

/// A deterministic finite-state machine over dense integer state,
/// input and output handles (spec §3.2).
///
/// `Dfsm` is always *compact*: state indices are always `0..num_states`
/// with no holes, since this implementation never deletes a state in
/// place (see `SPEC_FULL.md` §4.1 — the only mutation that could punch
/// a hole, `minimize`, rebuilds the table instead).
///
/// # Example
/// ```
/// use fsm::Dfsm;
/// use fsm_core::MachineKind;
///
/// let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
/// m.set_transition(0, 0, 0, Some(0)).unwrap();
/// m.set_transition(0, 1, 1, Some(0)).unwrap();
/// m.set_transition(1, 0, 0, Some(0)).unwrap();
/// m.set_transition(1, 1, 1, Some(1)).unwrap();
/// assert_eq!(m.get_next_state(0, 1), 1);
/// assert_eq!(m.get_output(1, 1), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Dfsm {
    pub(crate) kind: MachineKind,
    pub(crate) num_states: u32,
    pub(crate) num_inputs: u32,
    pub(crate) num_outputs: u32,
    /// `transitions[s][i]` = next state, or [`NULL_STATE`] if absent.
    pub(crate) transitions: Vec<Vec<StateId>>,
    /// `transition_outputs[s][i]`, meaningful iff `kind.has_transition_output()`.
    pub(crate) transition_outputs: Vec<Vec<Output>>,
    /// `state_outputs[s]`, meaningful iff `kind.has_state_output()`.
    pub(crate) state_outputs: Vec<Output>,
}

impl Dfsm {
    /// Creates an empty FSM of the given shape; all transitions start
    /// absent and all outputs start at [`DEFAULT_OUTPUT`].
    pub fn create(num_states: u32, num_inputs: u32, num_outputs: u32, kind: MachineKind) -> Self {
        assert!(num_states <= MAX_DENSE_RANGE);
        assert!(num_inputs <= MAX_DENSE_RANGE);
        assert!(num_outputs <= MAX_DENSE_RANGE);
        let transitions = vec![vec![NULL_STATE; num_inputs as usize]; num_states as usize];
        let transition_outputs =
            vec![vec![DEFAULT_OUTPUT; num_inputs as usize]; num_states as usize];
        let state_outputs = vec![DEFAULT_OUTPUT; num_states as usize];
        Dfsm {
            kind,
            num_states,
            num_inputs,
            num_outputs,
            transitions,
            transition_outputs,
            state_outputs,
        }
    }

    pub fn kind(&self) -> MachineKind {
        self.kind
    }

    pub fn num_states(&self) -> u32 {
        self.num_states
    }

    pub fn num_inputs(&self) -> u32 {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> u32 {
        self.num_outputs
    }

    /// Always `true` for this implementation; kept as a named predicate
    /// because several algorithms (spec §4.1, §7) require it as a
    /// documented precondition and must reject non-compact models.
    pub fn is_compact(&self) -> bool {
        self.transitions.len() == self.num_states as usize
    }

    /// Appends a new state, returning its index. `state_output` is
    /// ignored (and should be `None`) for kinds without state outputs.
    pub fn add_state(&mut self, state_output: Option<Output>) -> StateId {
        let id = self.num_states;
        self.num_states += 1;
        self.transitions.push(vec![NULL_STATE; self.num_inputs as usize]);
        self.transition_outputs
            .push(vec![DEFAULT_OUTPUT; self.num_inputs as usize]);
        self.state_outputs
            .push(state_output.unwrap_or(DEFAULT_OUTPUT));
        id
    }

    /// Grows the input alphabet by one, appending an absent column to
    /// every state's transition/output rows.
    pub fn inc_number_of_inputs(&mut self) {
        self.num_inputs += 1;
        for row in &mut self.transitions {
            row.push(NULL_STATE);
        }
        for row in &mut self.transition_outputs {
            row.push(DEFAULT_OUTPUT);
        }
    }

    pub fn inc_number_of_outputs(&mut self) {
        self.num_outputs += 1;
    }

    fn check_state(&self, s: StateId) -> Result<(), FsmError> {
        if s >= self.num_states {
            Err(FsmError::InvalidInput(format!(
                "state {s} out of range 0..{}",
                self.num_states
            )))
        } else {
            Ok(())
        }
    }

    fn check_input(&self, i: Input) -> Result<(), FsmError> {
        if i != STOUT_INPUT && i >= self.num_inputs {
            Err(FsmError::InvalidInput(format!(
                "input {i} out of range 0..{}",
                self.num_inputs
            )))
        } else {
            Ok(())
        }
    }

    /// Sets the transition `(s, i) -> t`, with `transition_output`
    /// required iff `self.kind().has_transition_output()`.
    pub fn set_transition(
        &mut self,
        s: StateId,
        i: Input,
        t: StateId,
        transition_output: Option<Output>,
    ) -> Result<(), FsmError> {
        self.check_state(s)?;
        self.check_state(t)?;
        self.check_input(i)?;
        if i == STOUT_INPUT {
            return Err(FsmError::InvalidInput(
                "STOUT_INPUT does not label a transition".into(),
            ));
        }
        self.transitions[s as usize][i as usize] = t;
        if self.kind.has_transition_output() {
            let out = transition_output.ok_or_else(|| {
                FsmError::InvalidInput("this machine kind requires a transition output".into())
            })?;
            self.transition_outputs[s as usize][i as usize] = out;
        }
        Ok(())
    }

    /// Sets a state output (when `i` is `None` or [`STOUT_INPUT`]) or a
    /// transition output (when `i` is `Some(input)`).
    pub fn set_output(&mut self, s: StateId, out: Output, i: Option<Input>) -> Result<(), FsmError> {
        self.check_state(s)?;
        match i {
            None | Some(STOUT_INPUT) => {
                self.state_outputs[s as usize] = out;
                Ok(())
            }
            Some(i) => {
                self.check_input(i)?;
                self.transition_outputs[s as usize][i as usize] = out;
                Ok(())
            }
        }
    }

    /// The output of `(s, i)`: a transition output if `i` is a real
    /// input, or the state output if `i == STOUT_INPUT`.
    pub fn get_output(&self, s: StateId, i: Input) -> Output {
        if i == STOUT_INPUT {
            self.state_outputs[s as usize]
        } else {
            self.transition_outputs[s as usize][i as usize]
        }
    }

    pub fn get_state_output(&self, s: StateId) -> Output {
        self.state_outputs[s as usize]
    }

    /// The next state of `(s, i)`, or [`NULL_STATE`] if absent.
    /// `i == STOUT_INPUT` returns `s` unchanged (observing state output
    /// does not move the machine).
    pub fn get_next_state(&self, s: StateId, i: Input) -> StateId {
        if i == STOUT_INPUT {
            s
        } else {
            self.transitions[s as usize][i as usize]
        }
    }

    /// Whether `(s, i)` is a defined transition.
    pub fn has_transition(&self, s: StateId, i: Input) -> bool {
        i == STOUT_INPUT || self.transitions[s as usize][i as usize] != NULL_STATE
    }

    /// The state reached by applying `seq` from `s`, stopping early
    /// (returning [`NULL_STATE`]) if the path runs off the transition
    /// table.
    pub fn get_end_path_state(&self, s: StateId, seq: &[Input]) -> StateId {
        let mut cur = s;
        for &i in seq {
            if cur == NULL_STATE {
                return NULL_STATE;
            }
            if i != STOUT_INPUT && !self.has_transition(cur, i) {
                return NULL_STATE;
            }
            cur = self.get_next_state(cur, i);
        }
        cur
    }

    /// The output sequence observed while applying `seq` from `s`. One
    /// output per input symbol (including `STOUT_INPUT` entries, which
    /// contribute the state output). Stops early if the path runs off
    /// the table, returning a shorter vector than `seq`.
    pub fn get_output_along_path(&self, s: StateId, seq: &[Input]) -> Vec<Output> {
        let mut cur = s;
        let mut out = Vec::with_capacity(seq.len());
        for &i in seq {
            if cur == NULL_STATE || (i != STOUT_INPUT && !self.has_transition(cur, i)) {
                break;
            }
            out.push(self.get_output(cur, i));
            cur = self.get_next_state(cur, i);
        }
        out
    }

    /// All state indices `0..num_states`.
    pub fn states(&self) -> impl Iterator<Item = StateId> + '_ {
        0..self.num_states
    }

    /// All input symbols `0..num_inputs` (never includes `STOUT_INPUT`).
    pub fn inputs(&self) -> impl Iterator<Item = Input> + '_ {
        0..self.num_inputs
    }

    /// Whether every state is reachable from state 0 via some input
    /// sequence. Used as a documented precondition note by several BFS
    /// based synthesis routines (`SPEC_FULL.md` "Supplemented" section).
    pub fn is_connected(&self) -> bool {
        if self.num_states == 0 {
            return true;
        }
        let mut seen = vec![false; self.num_states as usize];
        let mut stack = vec![0u32];
        seen[0] = true;
        let mut count = 1;
        while let Some(s) = stack.pop() {
            for i in self.inputs() {
                let t = self.get_next_state(s, i);
                if t != NULL_STATE && !seen[t as usize] {
                    seen[t as usize] = true;
                    count += 1;
                    stack.push(t);
                }
            }
        }
        count == self.num_states as usize
    }
}

impl std::fmt::Display for Dfsm {
    /// The human-readable transition dump referenced in spec §6
    /// (diagnostics only — not the on-disk FSM file format).
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:?} ({} states, {} inputs, {} outputs)", self.kind, self.num_states, self.num_inputs, self.num_outputs)?;
        for s in self.states() {
            if self.kind.has_state_output() {
                write!(f, "state {s} [out={}]: ", self.state_outputs[s as usize])?;
            } else {
                write!(f, "state {s}: ")?;
            }
            for i in self.inputs() {
                let t = self.get_next_state(s, i);
                if t == NULL_STATE {
                    write!(f, "{i}->- ")?;
                } else if self.kind.has_transition_output() {
                    write!(f, "{i}->{t}/{} ", self.transition_outputs[s as usize][i as usize])?;
                } else {
                    write!(f, "{i}->{t} ")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_state_mealy() -> Dfsm {
        let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
        m.set_transition(0, 0, 0, Some(0)).unwrap();
        m.set_transition(0, 1, 1, Some(0)).unwrap();
        m.set_transition(1, 0, 0, Some(0)).unwrap();
        m.set_transition(1, 1, 1, Some(1)).unwrap();
        m
    }

    #[test]
    fn basic_accessors() {
        let m = two_state_mealy();
        assert_eq!(m.get_output(0, 1), 0);
        assert_eq!(m.get_output(1, 1), 1);
        assert_eq!(m.get_next_state(1, 0), 0);
        assert!(m.is_connected());
        assert!(m.is_compact());
    }

    #[test]
    fn output_along_path_distinguishes_states() {
        let m = two_state_mealy();
        assert_ne!(
            m.get_output_along_path(0, &[1]),
            m.get_output_along_path(1, &[1])
        );
    }

    #[test]
    fn out_of_range_is_rejected() {
        let mut m = two_state_mealy();
        assert!(m.set_transition(5, 0, 0, Some(0)).is_err());
    }
}
