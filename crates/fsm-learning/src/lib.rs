//! Black-box/teacher abstraction and active learners (spec §4.5, §4.6).

pub mod blackbox;
pub mod learn;

pub use blackbox::{BlackBox, ModelBackedBlackBox, Teacher, TreeCachedBlackBox};
