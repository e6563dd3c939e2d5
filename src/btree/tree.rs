//! Ordered B-tree of self-keyed items.
//!
//! This module provides the `OrderedTree` handle with operations for:
//! - insert_or_update / remove / remove_min / remove_max: mutations
//! - get / contains / min / max / nearest: point queries
//! - for_each / for_each_in_range: push traversal with cancellation
//! - iter / range: lazy pull traversal

use super::cursor::Cursor;
use super::node::{Node, Split};
use crate::error::Result;
use crate::guard::{CountObservers, IterationCounter, IterationGuard, SubscriptionId};
use crate::types::{exceeds_upper, Comparable, Halt, Nearest, NodeLimits, Traversal, TreeConfig};
use parking_lot::{RwLock, RwLockReadGuard};
use std::fmt;
use std::mem;
use std::ops::ControlFlow;

struct TreeState<T> {
    root: Node<T>,
    count: usize,
}

/// An in-memory B-tree where every item is its own key.
///
/// All methods take `&self`. Mutations fail with
/// [`TreeError::IllegalState`](crate::TreeError::IllegalState) while any
/// traversal of the same tree is in progress, including from inside a
/// traversal's own visitor.
pub struct OrderedTree<T> {
    config: TreeConfig,
    limits: NodeLimits,
    state: RwLock<TreeState<T>>,
    iterations: IterationCounter,
    observers: CountObservers,
}

impl<T> Default for OrderedTree<T> {
    fn default() -> Self {
        Self::with_config(TreeConfig::default())
    }
}

impl<T> OrderedTree<T> {
    /// Create an empty tree with the default branching factor
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tree; factors below 3 are raised to 3
    pub fn with_branching_factor(branching_factor: usize) -> Self {
        Self::with_config(TreeConfig::new(branching_factor))
    }

    /// Create an empty tree from a configuration
    pub fn with_config(config: TreeConfig) -> Self {
        let config = TreeConfig::new(config.branching_factor);
        let limits = config.limits();
        Self {
            config,
            limits,
            state: RwLock::new(TreeState {
                root: Node::new_leaf(limits),
                count: 0,
            }),
            iterations: IterationCounter::new(),
            observers: CountObservers::new(),
        }
    }

    /// Get the tree configuration
    pub fn config(&self) -> TreeConfig {
        self.config
    }

    /// Get the branching factor
    pub fn branching_factor(&self) -> usize {
        self.config.branching_factor
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.state.read_recursive().count
    }

    /// Check if the tree holds no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the height of the tree (1 for a lone leaf root)
    pub fn height(&self) -> usize {
        self.state.read_recursive().root.height()
    }

    /// Get the number of traversals currently running
    pub fn active_iterations(&self) -> usize {
        self.iterations.active()
    }

    /// Register a callback invoked with the new count whenever it changes.
    ///
    /// Callbacks run after the mutation completed; a panicking callback is
    /// logged and ignored.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    /// Remove a count callback
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Remove all items
    pub fn clear(&self) -> Result<()> {
        self.iterations.ensure_idle()?;
        let previous = {
            let mut state = self.state.write();
            state.root = Node::new_leaf(self.limits);
            mem::replace(&mut state.count, 0)
        };
        tracing::debug!(removed = previous, "cleared ordered tree");
        if previous != 0 {
            self.observers.notify(0);
        }
        Ok(())
    }

    /// Remove and return the smallest item
    pub fn remove_min(&self) -> Result<Option<T>> {
        self.remove_with(|root, limits| root.remove_min(limits))
    }

    /// Remove and return the largest item
    pub fn remove_max(&self) -> Result<Option<T>> {
        self.remove_with(|root, limits| root.remove_max(limits))
    }

    fn remove_with<F>(&self, remove: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Node<T>, NodeLimits) -> Option<T>,
    {
        self.iterations.ensure_idle()?;
        let (removed, count) = {
            let mut state = self.state.write();
            let removed = remove(&mut state.root, self.limits);
            if removed.is_some() {
                if !state.root.is_leaf() && state.root.len() == 0 {
                    let old_root = mem::replace(&mut state.root, Node::new_leaf(self.limits));
                    state.root = old_root.into_only_child();
                    tracing::trace!(height = state.root.height(), "collapsed root");
                }
                state.count -= 1;
            }
            (removed, state.count)
        };
        if removed.is_some() {
            self.observers.notify(count);
        }
        Ok(removed)
    }
}

impl<T: Ord> OrderedTree<T> {
    /// Insert an item, or replace the stored item that compares equal.
    ///
    /// Returns `true` if an existing item was replaced.
    pub fn insert_or_update(&self, item: T) -> Result<bool> {
        self.iterations.ensure_idle()?;
        let (updated, count) = {
            let mut state = self.state.write();
            let outcome = state.root.insert_or_update(item, self.limits);
            if !outcome.updated {
                if let Some(Split { separator, right }) = outcome.split {
                    let left = mem::replace(&mut state.root, Node::new_leaf(self.limits));
                    state.root = Node::new_root(left, separator, right, self.limits);
                    tracing::trace!(height = state.root.height(), "split root");
                }
                state.count += 1;
            }
            (outcome.updated, state.count)
        };
        if !updated {
            self.observers.notify(count);
        }
        Ok(updated)
    }

    /// Remove and return the item matching `key`
    pub fn remove<Q>(&self, key: &Q) -> Result<Option<T>>
    where
        Q: Comparable<T> + ?Sized,
    {
        self.remove_with(|root, limits| root.remove(key, limits))
    }

    /// Check if an item matching `key` is stored
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Q: Comparable<T> + ?Sized,
    {
        self.state.read_recursive().root.get(key).is_some()
    }

    /// Visit every item in ascending order until the visitor breaks
    pub fn for_each<F>(&self, mut visitor: F) -> Traversal
    where
        F: FnMut(&T) -> ControlFlow<()>,
    {
        let _guard = self.iterations.enter();
        let state = self.state.read_recursive();
        Halt::into_traversal(state.root.visit::<T, F>(None, None, false, &mut visitor))
    }

    /// Visit every item `>= lower` and below `upper` (or equal to it when
    /// `max_inclusive`) in ascending order until the visitor breaks.
    ///
    /// Missing bounds are open; `lower > upper` visits nothing.
    pub fn for_each_in_range<Q, F>(
        &self,
        lower: Option<&Q>,
        upper: Option<&Q>,
        max_inclusive: bool,
        mut visitor: F,
    ) -> Traversal
    where
        Q: Comparable<T> + ?Sized,
        F: FnMut(&T) -> ControlFlow<()>,
    {
        let _guard = self.iterations.enter();
        let state = self.state.read_recursive();
        Halt::into_traversal(state.root.visit(lower, upper, max_inclusive, &mut visitor))
    }
}

impl<T: Ord + Clone> OrderedTree<T> {
    /// Get the item matching `key`
    pub fn get<Q>(&self, key: &Q) -> Option<T>
    where
        Q: Comparable<T> + ?Sized,
    {
        self.state.read_recursive().root.get(key).cloned()
    }

    /// Get the smallest item
    pub fn min(&self) -> Option<T> {
        self.state.read_recursive().root.min().cloned()
    }

    /// Get the largest item
    pub fn max(&self) -> Option<T> {
        self.state.read_recursive().root.max().cloned()
    }

    /// Get the item matching `key`, or its nearest neighbors on both sides
    pub fn nearest<Q>(&self, key: &Q) -> Nearest<T>
    where
        Q: Comparable<T> + ?Sized,
    {
        self.state.read_recursive().root.nearest(key).map(T::clone)
    }

    /// Lazily iterate over all items in ascending order
    pub fn iter(&self) -> Range<'_, '_, T, T> {
        Range::new(self, None, None, false)
    }

    /// Lazily iterate over items `>= lower` and below `upper` (or equal to
    /// it when `max_inclusive`)
    pub fn range<'a, 'q, Q>(
        &'a self,
        lower: Option<&'q Q>,
        upper: Option<&'q Q>,
        max_inclusive: bool,
    ) -> Range<'a, 'q, T, Q>
    where
        Q: Comparable<T> + ?Sized,
    {
        Range::new(self, lower, upper, max_inclusive)
    }
}

#[cfg(feature = "diagnostics")]
impl<T: fmt::Debug> OrderedTree<T> {
    /// Export the node structure for inspection
    pub fn export_tree(&self) -> crate::diagnostics::TreeNode {
        self.state.read_recursive().root.snapshot()
    }

    /// Export the node structure as JSON
    pub fn export_json(&self) -> Result<String> {
        self.export_tree().to_json()
    }

    /// Render the tree sideways, largest items first
    pub fn pretty_string(&self) -> String {
        self.export_tree().pretty_string()
    }
}

impl<T> fmt::Debug for OrderedTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedTree")
            .field("count", &self.len())
            .field("branching_factor", &self.branching_factor())
            .finish()
    }
}

impl<'a, T: Ord + Clone> IntoIterator for &'a OrderedTree<T> {
    type Item = T;
    type IntoIter = Range<'a, 'a, T, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy ascending iterator over an [`OrderedTree`].
///
/// Holds the tree's iteration guard and a read lock until dropped, so the
/// tree rejects mutations for the iterator's whole lifetime.
pub struct Range<'a, 'q, T, Q: ?Sized = T> {
    state: RwLockReadGuard<'a, TreeState<T>>,
    _guard: IterationGuard<'a>,
    cursor: Cursor,
    upper: Option<&'q Q>,
    max_inclusive: bool,
}

impl<'a, 'q, T, Q> Range<'a, 'q, T, Q>
where
    Q: Comparable<T> + ?Sized,
{
    fn new(
        tree: &'a OrderedTree<T>,
        lower: Option<&'q Q>,
        upper: Option<&'q Q>,
        max_inclusive: bool,
    ) -> Self {
        let guard = tree.iterations.enter();
        let state = tree.state.read_recursive();
        let cursor = match lower {
            Some(key) => Cursor::seek(&state.root, key),
            None => Cursor::first(&state.root),
        };
        Self {
            state,
            _guard: guard,
            cursor,
            upper,
            max_inclusive,
        }
    }
}

impl<T, Q> Iterator for Range<'_, '_, T, Q>
where
    T: Clone,
    Q: Comparable<T> + ?Sized,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.cursor.next(&self.state.root)?;
        if exceeds_upper(self.upper, item, self.max_inclusive) {
            self.cursor.finish();
            return None;
        }
        Some(item.clone())
    }
}

impl<T, Q> std::iter::FusedIterator for Range<'_, '_, T, Q>
where
    T: Clone,
    Q: Comparable<T> + ?Sized,
{
}
