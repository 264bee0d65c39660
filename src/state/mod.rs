//! The shared state tree.
//!
//! A single JSON tree holds all state. Access is always scoped to a
//! [`PathSet`](crate::types::PathSet): reads build a partial view containing
//! only the declared subtrees, writes splice each declared subtree back
//! without touching siblings.

mod tree;

pub use tree::StateTree;
