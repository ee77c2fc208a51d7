//! C6: active learners (spec §4.6). Every learner shares the same
//! skeleton — build/refine an internal structure from membership
//! queries, conjecture, issue an equivalence query, process the
//! counterexample — but the internal structure differs by family.

pub mod discrimination_tree;
pub mod good_split;
pub mod lstar;
pub mod observation_pack;
pub mod observation_tree;
pub mod quotient;
pub mod ttt;

pub use discrimination_tree::learn as learn_discrimination_tree;
pub use good_split::learn as learn_good_split;
pub use lstar::{learn as learn_lstar, CounterexampleProcessing};
pub use observation_pack::learn as learn_observation_pack;
pub use observation_tree::{learn as learn_observation_tree, ObservationTreeMethod};
pub use quotient::learn as learn_quotient;
pub use ttt::learn as learn_ttt;

/// Invoked after every conjecture update (spec §5 "cancellation").
/// Returning `false` stops the learner, which returns the best-so-far
/// conjecture immediately.
pub trait TentativeModelSink {
    fn provide(&mut self, conjecture: &fsm::Dfsm) -> bool;
}

impl<F: FnMut(&fsm::Dfsm) -> bool> TentativeModelSink for F {
    fn provide(&mut self, conjecture: &fsm::Dfsm) -> bool {
        self(conjecture)
    }
}

/// A no-op sink that never cancels, for callers that don't need the
/// tentative-model hook.
pub struct NoCancellation;

impl TentativeModelSink for NoCancellation {
    fn provide(&mut self, _conjecture: &fsm::Dfsm) -> bool {
        true
    }
}
