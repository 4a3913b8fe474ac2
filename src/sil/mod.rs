//! Subset inclusion lattice: namespaces, restrictions, and the spatial
//! index used to narrow them.

pub mod interval_tree;
pub mod namespace;
pub mod restriction;

pub use interval_tree::IntervalTree;
pub use namespace::{SilEnumeratedNamespace, SilNamespace, SilRangeNamespace};
pub use restriction::SilRestriction;
