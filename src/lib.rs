//! # Ordered Trees
//!
//! In-memory ordered containers built on B-trees, with range traversal,
//! early cancellation and nearest-neighbor queries.
//!
//! ## Architecture
//!
//! - **B-Tree** (`btree`): `OrderedTree<T>`, where every item is its own key
//!   and internal nodes hold real items
//! - **B+Tree** (`bplus`): `OrderedMap<K, V>`, where values live in the
//!   leaves and internal nodes hold routing copies of keys
//! - **Guards** (`guard`): active-traversal counter that rejects mutations
//!   during iteration, and count change observers
//! - **Types** (`types`): configuration, key comparison and query results
//!
//! Lookups accept any query type implementing [`Comparable`], so a tree of
//! `String` keys can be searched with `&str` and a tree of records with the
//! field they are ordered by.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ordered_tree::{OrderedMap, Traversal};
//! use std::ops::ControlFlow;
//!
//! let map = OrderedMap::with_branching_factor(16);
//!
//! // Insert or update entries
//! map.insert_or_update(10, "ten")?;
//! map.insert_or_update(20, "twenty")?;
//!
//! // Point lookups
//! assert_eq!(map.get(&10), Some("ten"));
//!
//! // Neighbors of a missing key
//! let nearest = map.nearest(&15);
//! assert_eq!(nearest.lower, Some((10, "ten")));
//! assert_eq!(nearest.upper, Some((20, "twenty")));
//!
//! // Range scan, upper bound inclusive
//! for (key, value) in map.range(Some(&10), Some(&20), true) {
//!     println!("{key} -> {value}");
//! }
//!
//! // Push traversal with cancellation
//! let traversal = map.for_each(|key, _| {
//!     if *key >= 10 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
//! });
//! assert_eq!(traversal, Traversal::Canceled);
//! ```

pub mod bplus;
pub mod btree;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod error;
pub mod guard;
pub mod types;

pub use error::{Result, TreeError};
pub use types::{
    Comparable, Nearest, Traversal, TreeConfig, DEFAULT_BRANCHING_FACTOR, MIN_BRANCHING_FACTOR,
};

// Re-export main public API
pub use bplus::{MapRange, OrderedMap};
pub use btree::{OrderedTree, Range};
pub use guard::{IterationGuard, SubscriptionId};

#[cfg(feature = "diagnostics")]
pub use diagnostics::TreeNode;
