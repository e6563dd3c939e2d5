//! B+tree implementation.
//!
//! Entries are kept in the leaves only; internal nodes hold copies of keys
//! for routing. Supports the same operations as the B-tree with separate
//! keys and values.

mod cursor;
mod node;
mod tree;

pub use tree::{MapRange, OrderedMap};
