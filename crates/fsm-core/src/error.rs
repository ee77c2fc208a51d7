use thiserror::Error;

/// The one error type every fallible public API in this workspace
/// returns (spec §7). Internal learner inconsistencies are recovered
/// locally by split/reidentify and never surface as this type; the one
/// runtime failure that does surface out of a learner is
/// [`FsmError::BlackBoxNotResettable`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsmError {
    #[error("operation requires a compact FSM (state indices 0..numStates with no holes)")]
    NotCompact,
    #[error("operation requires a reduced (minimized) FSM")]
    NotReduced,
    #[error("FSM has no preset distinguishing sequence")]
    NoPds,
    #[error("FSM has no adaptive distinguishing sequence")]
    NoAds,
    #[error("state {0} has no state verifying sequence")]
    NoSvs(u32),
    #[error("FSM has no homing sequence")]
    NoHs,
    #[error("FSM has no synchronizing sequence")]
    NoSs,
    #[error("black box is not resettable, but the operation requires a reset")]
    BlackBoxNotResettable,
    #[error("query produced an inconsistent observation: {0}")]
    InconsistentQuery(String),
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for FsmError {
    fn from(e: std::io::Error) -> Self {
        FsmError::Io(e.to_string())
    }
}
