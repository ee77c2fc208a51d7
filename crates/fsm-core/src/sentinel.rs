//! Reserved sentinel values (spec §3.1). These must never collide with
//! a dense, real symbol; [`crate::MAX_DENSE_RANGE`] is the bound every
//! constructor in `fsm` enforces to guarantee that.

use crate::{Input, Output, StateId};

/// Marker input meaning "observe the state output", usable inside an
/// input sequence alongside real inputs.
pub const STOUT_INPUT: Input = Input::MAX;

/// "Output not yet determined / transparent".
pub const DEFAULT_OUTPUT: Output = Output::MAX;

/// Returned in place of an output when a query is invalid or a
/// transition is absent.
pub const WRONG_OUTPUT: Output = Output::MAX - 1;

/// Returned in place of a state when a query is invalid.
pub const WRONG_STATE: StateId = StateId::MAX;

/// Marks the absence of a transition (an unset `(state, input)` pair).
pub const NULL_STATE: StateId = StateId::MAX - 1;
