//! C3: separating-sequence synthesis (spec §3.4–§3.7, §4.3). Every
//! algorithm here treats the `Dfsm` it's given as read-only.

pub mod ads;
pub mod characterizing;
pub mod covers;
pub mod pair_index;
pub mod pds;
pub mod prefix_set;
pub mod separating;
pub mod splitting_tree;
pub mod svs;
pub mod sync_homing;

pub use prefix_set::PrefixSet;
pub use splitting_tree::{SplittingTree, SplittingTreeNode};
