//! Order-preserving map/set aliases shared by every synthesis and
//! learning module in this workspace, so partition refinement and
//! state<->index bookkeeping iterate in insertion order instead of
//! hash order.

pub type Map<K, V> = indexmap::IndexMap<K, V>;
pub type Set<T> = indexmap::IndexSet<T>;
