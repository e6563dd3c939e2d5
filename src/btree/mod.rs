//! B-tree implementation.
//!
//! This module provides an in-memory B-tree whose items are their own keys:
//! - Point lookups (get, contains, min, max)
//! - Insertions with replace-on-equal (insert_or_update)
//! - Deletions (remove, remove_min, remove_max)
//! - Nearest-neighbor queries
//! - Range scans, pushed to a visitor or pulled through an iterator

mod cursor;
mod node;
mod tree;

pub use tree::{OrderedTree, Range};
