//! Shared vocabulary for the `fsm` and `fsm-learning` crates: the
//! opaque symbol types, the reserved sentinels of spec §3.1, and the
//! error type every fallible public API in this workspace returns.

mod error;
pub mod collections;
pub mod sentinel;

pub use error::FsmError;
pub use sentinel::{DEFAULT_OUTPUT, NULL_STATE, STOUT_INPUT, WRONG_OUTPUT, WRONG_STATE};

/// An input symbol, or [`STOUT_INPUT`] when used inside an input sequence.
pub type Input = u32;
/// An output symbol, or one of [`DEFAULT_OUTPUT`] / [`WRONG_OUTPUT`].
pub type Output = u32;
/// A state index, or one of [`WRONG_STATE`] / [`NULL_STATE`].
pub type StateId = u32;

/// The four machine kinds a [`crate::Dfsm`][fsm-model] can be: whether a
/// state carries an output and/or a transition carries an output
/// differs per kind (spec §3.2 table).
///
/// [fsm-model]: https://docs.rs/fsm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineKind {
    Mealy,
    Moore,
    Dfa,
    Dfsm,
}

/// Per-kind shape description (spec §9 "Polymorphism by FSM kind" —
/// a tagged variant plus a descriptor trait, no virtual inheritance).
pub trait KindDescriptor {
    /// Whether states of this kind carry an output.
    fn is_output_state(&self) -> bool;
    /// Whether transitions of this kind carry an output.
    fn is_output_transition(&self) -> bool;
    /// Default output assigned before a value has been set explicitly.
    fn default_state_output(&self) -> Output;
}

impl KindDescriptor for MachineKind {
    fn is_output_state(&self) -> bool {
        matches!(self, MachineKind::Moore | MachineKind::Dfa | MachineKind::Dfsm)
    }

    fn is_output_transition(&self) -> bool {
        matches!(self, MachineKind::Mealy | MachineKind::Dfsm)
    }

    fn default_state_output(&self) -> Output {
        DEFAULT_OUTPUT
    }
}

impl MachineKind {
    /// Whether states of this kind carry an output.
    pub fn has_state_output(self) -> bool {
        self.is_output_state()
    }

    /// Whether transitions of this kind carry an output.
    pub fn has_transition_output(self) -> bool {
        self.is_output_transition()
    }
}

/// A cap applied to `numStates`/`numInputs`/`numOutputs` so that none of
/// them can ever collide with the sentinel values, which live at the
/// top of the `u32` range (see `SPEC_FULL.md` §3.1).
pub const MAX_DENSE_RANGE: u32 = u32::MAX - 16;
