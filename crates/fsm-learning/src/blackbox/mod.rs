//! C5: the black-box abstraction and the teacher built on top of it
//! (spec §4.5). A black box is a stateful, sequential thing — a reset
//! followed by zero or more queries — not a pure function, because
//! real devices and reference models alike are.

mod model_backed;
mod teacher;
mod tree_cached;

pub use model_backed::ModelBackedBlackBox;
pub use teacher::Teacher;
pub use tree_cached::TreeCachedBlackBox;

use fsm::Dfsm;
use fsm_core::{FsmError, Input, MachineKind, Output};

/// A sequential black box: `reset` returns it to its initial state,
/// `query` applies one input and returns the observed output, moving
/// the box forward. Every method here takes `&self`: implementations
/// hide their mutable position behind interior mutability so the
/// counters stay readable through a shared reference, matching the
/// convergent-node learners that hold many simultaneous views onto one
/// teacher (spec §4.6.5).
pub trait BlackBox {
    fn num_inputs(&self) -> u32;
    fn num_outputs(&self) -> u32;
    fn model_kind(&self) -> MachineKind;
    fn is_resettable(&self) -> bool;

    /// Returns the box to its initial state. Errors with
    /// [`FsmError::BlackBoxNotResettable`] if `!is_resettable()`.
    fn reset(&self) -> Result<(), FsmError>;

    /// Applies one input from the current position, returning the
    /// observed output.
    fn query(&self, input: Input) -> Output;

    /// Applies a sequence of inputs from the current position,
    /// returning one output per input.
    fn query_seq(&self, seq: &[Input]) -> Vec<Output> {
        seq.iter().map(|&i| self.query(i)).collect()
    }

    /// Resets, then applies `seq`.
    fn reset_and_query(&self, seq: &[Input]) -> Result<Vec<Output>, FsmError> {
        self.reset()?;
        Ok(self.query_seq(seq))
    }

    fn queried_symbols_count(&self) -> u64;
    fn applied_reset_count(&self) -> u64;

    /// The reference model backing this box, when there is one (spec
    /// §4.5 "model-backed"). [`Teacher`] uses this to answer
    /// equivalence queries by direct state-pairing instead of falling
    /// back to test-suite emulation.
    fn reference_model(&self) -> Option<&Dfsm> {
        None
    }
}
