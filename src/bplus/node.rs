//! B+tree node: entries live in leaves, internal keys only route.
//!
//! Leaves hold `keys[i] -> values[i]`. An internal node holds routing keys
//! and `keys.len() + 1` children; every key in `children[i]` is less than
//! `keys[i]` and every key in `children[i + 1]` is at least `keys[i]`.
//! A routing key is a copy of the first key of its right subtree at the
//! time it was created and is not updated when that entry is removed later.

use crate::types::{exceeds_upper, Comparable, Halt, Nearest, NodeLimits};
use std::cmp::Ordering;
use std::mem;
use std::ops::ControlFlow;

/// Borrowed leaf entry
pub(crate) type Entry<'a, K, V> = (&'a K, &'a V);

#[derive(Debug)]
pub(crate) struct Node<K, V> {
    pub(super) keys: Vec<K>,
    /// Empty for internal nodes
    pub(super) values: Vec<V>,
    /// Empty for leaves
    pub(super) children: Vec<Node<K, V>>,
}

pub(crate) struct Split<K, V> {
    pub separator: K,
    pub right: Node<K, V>,
}

pub(crate) enum InsertOutcome<K, V> {
    Updated,
    Inserted(Option<Split<K, V>>),
}

impl<K, V> Node<K, V> {
    pub(crate) fn new_leaf(limits: NodeLimits) -> Self {
        Self {
            keys: Vec::with_capacity(limits.max_keys + 1),
            values: Vec::with_capacity(limits.max_keys + 1),
            children: Vec::new(),
        }
    }

    pub(crate) fn new_root(left: Self, separator: K, right: Self, limits: NodeLimits) -> Self {
        let mut keys = Vec::with_capacity(limits.max_keys + 1);
        keys.push(separator);
        let mut children = Vec::with_capacity(limits.max_keys + 2);
        children.push(left);
        children.push(right);
        Self {
            keys,
            values: Vec::new(),
            children,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn into_only_child(mut self) -> Self {
        debug_assert!(self.keys.is_empty() && self.children.len() == 1);
        self.children.swap_remove(0)
    }

    pub(crate) fn height(&self) -> usize {
        let mut height = 1;
        let mut node = self;
        while let Some(child) = node.children.first() {
            height += 1;
            node = child;
        }
        height
    }

    fn entry(&self, index: usize) -> Entry<'_, K, V> {
        (&self.keys[index], &self.values[index])
    }

    /// Index of the first key `>= key`, or `len()` if there is none
    pub(crate) fn find_insertion_point<Q>(&self, key: &Q) -> usize
    where
        Q: Comparable<K> + ?Sized,
    {
        self.keys
            .partition_point(|k| key.compare(k) == Ordering::Greater)
    }

    /// Child whose key range contains `key`
    pub(crate) fn child_index<Q>(&self, key: &Q) -> usize
    where
        Q: Comparable<K> + ?Sized,
    {
        self.keys
            .partition_point(|k| key.compare(k) != Ordering::Less)
    }

    /// Leaf slot holding `key`
    fn position<Q>(&self, key: &Q) -> Result<usize, usize>
    where
        Q: Comparable<K> + ?Sized,
    {
        let index = self.find_insertion_point(key);
        match self.keys.get(index) {
            Some(k) if key.compare(k) == Ordering::Equal => Ok(index),
            _ => Err(index),
        }
    }

    fn leaf_for<Q>(&self, key: &Q) -> &Self
    where
        Q: Comparable<K> + ?Sized,
    {
        let mut node = self;
        while !node.is_leaf() {
            node = &node.children[node.child_index(key)];
        }
        node
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<Entry<'_, K, V>>
    where
        Q: Comparable<K> + ?Sized,
    {
        let leaf = self.leaf_for(key);
        leaf.position(key).ok().map(|index| leaf.entry(index))
    }

    pub(crate) fn min(&self) -> Option<Entry<'_, K, V>> {
        let mut node = self;
        while let Some(child) = node.children.first() {
            node = child;
        }
        (!node.keys.is_empty()).then(|| node.entry(0))
    }

    pub(crate) fn max(&self) -> Option<Entry<'_, K, V>> {
        let mut node = self;
        while let Some(child) = node.children.last() {
            node = child;
        }
        node.keys.len().checked_sub(1).map(|last| node.entry(last))
    }

    pub(crate) fn nearest<Q>(&self, key: &Q) -> Nearest<Entry<'_, K, V>>
    where
        Q: Comparable<K> + ?Sized,
    {
        if self.is_leaf() {
            return match self.position(key) {
                Ok(index) => Nearest::exact(self.entry(index)),
                Err(index) => Nearest::between(
                    index.checked_sub(1).map(|below| self.entry(below)),
                    (index < self.len()).then(|| self.entry(index)),
                ),
            };
        }

        let index = self.child_index(key);
        let mut nearest = self.children[index].nearest(key);
        if nearest.is_resolved() {
            return nearest;
        }

        // A missing side lies in the adjacent subtree
        if nearest.lower.is_none() && index > 0 {
            nearest.lower = self.children[index - 1].nearest(key).lower;
        }
        if nearest.upper.is_none() && index < self.len() {
            nearest.upper = self.children[index + 1].nearest(key).upper;
        }
        nearest
    }

    pub(crate) fn visit<Q, F>(
        &self,
        lower: Option<&Q>,
        upper: Option<&Q>,
        max_inclusive: bool,
        visitor: &mut F,
    ) -> ControlFlow<Halt>
    where
        Q: Comparable<K> + ?Sized,
        F: FnMut(&K, &V) -> ControlFlow<()>,
    {
        if self.is_leaf() {
            let start = lower.map_or(0, |key| self.find_insertion_point(key));
            for index in start..self.len() {
                let (key, value) = self.entry(index);
                if exceeds_upper(upper, key, max_inclusive) {
                    return ControlFlow::Break(Halt::UpperBound);
                }
                if visitor(key, value).is_break() {
                    return ControlFlow::Break(Halt::Visitor);
                }
            }
        } else {
            let start = lower.map_or(0, |key| self.child_index(key));
            for child in &self.children[start..] {
                child.visit(lower, upper, max_inclusive, visitor)?;
            }
        }
        ControlFlow::Continue(())
    }
}

impl<K: Clone, V> Node<K, V> {
    pub(crate) fn remove_min(&mut self, limits: NodeLimits) -> Option<(K, V)> {
        if self.is_leaf() {
            if self.keys.is_empty() {
                return None;
            }
            return Some((self.keys.remove(0), self.values.remove(0)));
        }
        let removed = self.children[0].remove_min(limits);
        if removed.is_some() {
            self.rebalance(0, limits);
        }
        removed
    }

    pub(crate) fn remove_max(&mut self, limits: NodeLimits) -> Option<(K, V)> {
        if self.is_leaf() {
            let key = self.keys.pop()?;
            let value = self.values.pop().expect("leaf keys and values have equal length");
            return Some((key, value));
        }
        let last = self.len();
        let removed = self.children[last].remove_max(limits);
        if removed.is_some() {
            self.rebalance(last, limits);
        }
        removed
    }

    pub(crate) fn remove<Q>(&mut self, key: &Q, limits: NodeLimits) -> Option<(K, V)>
    where
        Q: Comparable<K> + ?Sized,
    {
        if self.is_leaf() {
            let index = self.position(key).ok()?;
            return Some((self.keys.remove(index), self.values.remove(index)));
        }

        let index = self.child_index(key);
        let removed = self.children[index].remove(key, limits);
        if removed.is_some() {
            self.rebalance(index, limits);
        }
        removed
    }

    fn rebalance(&mut self, index: usize, limits: NodeLimits) {
        if self.children[index].len() >= limits.min_keys {
            return;
        }

        let has_left = index > 0;
        let has_right = index < self.len();

        if has_left && self.children[index - 1].len() > limits.min_keys {
            self.borrow_from_left(index);
        } else if has_right && self.children[index + 1].len() > limits.min_keys {
            self.borrow_from_right(index);
        } else if has_left {
            self.merge(index - 1);
        } else if has_right {
            self.merge(index);
        } else {
            panic!("underflow in child {index} of a node without siblings");
        }
    }

    fn borrow_from_left(&mut self, index: usize) {
        let (before, after) = self.children.split_at_mut(index);
        let left = &mut before[index - 1];
        let child = &mut after[0];

        let moved = left.keys.pop().expect("left sibling has keys to lend");
        if child.is_leaf() {
            // The moved entry becomes the child's first key
            let value = left.values.pop().expect("leaf keys and values have equal length");
            self.keys[index - 1] = moved.clone();
            child.keys.insert(0, moved);
            child.values.insert(0, value);
        } else {
            let separator = mem::replace(&mut self.keys[index - 1], moved);
            child.keys.insert(0, separator);
            let grandchild = left.children.pop().expect("internal sibling has children");
            child.children.insert(0, grandchild);
        }
    }

    fn borrow_from_right(&mut self, index: usize) {
        let (before, after) = self.children.split_at_mut(index + 1);
        let child = &mut before[index];
        let right = &mut after[0];

        let moved = right.keys.remove(0);
        if child.is_leaf() {
            child.keys.push(moved);
            child.values.push(right.values.remove(0));
            self.keys[index] = right.keys[0].clone();
        } else {
            let separator = mem::replace(&mut self.keys[index], moved);
            child.keys.push(separator);
            child.children.push(right.children.remove(0));
        }
    }

    /// Merge `children[index + 1]` into `children[index]`
    fn merge(&mut self, index: usize) {
        let right = self.children.remove(index + 1);
        let separator = self.keys.remove(index);
        let left = &mut self.children[index];

        // Leaves drop the routing key, internal nodes pull it down
        if !left.is_leaf() {
            left.keys.push(separator);
        }
        left.keys.extend(right.keys);
        left.values.extend(right.values);
        left.children.extend(right.children);

        tracing::trace!(merged_len = left.keys.len(), "merged b+tree nodes");
    }
}

impl<K: Ord + Clone, V> Node<K, V> {
    pub(crate) fn insert_or_update(&mut self, key: K, value: V, limits: NodeLimits) -> InsertOutcome<K, V> {
        if self.is_leaf() {
            match self.position(&key) {
                Ok(index) => {
                    self.keys[index] = key;
                    self.values[index] = value;
                    return InsertOutcome::Updated;
                }
                Err(index) => {
                    self.keys.insert(index, key);
                    self.values.insert(index, value);
                }
            }
        } else {
            let index = self.child_index(&key);
            match self.children[index].insert_or_update(key, value, limits) {
                InsertOutcome::Inserted(Some(Split { separator, right })) => {
                    self.keys.insert(index, separator);
                    self.children.insert(index + 1, right);
                }
                outcome => return outcome,
            }
        }

        let split = (self.len() > limits.max_keys).then(|| self.split(limits));
        InsertOutcome::Inserted(split)
    }

    /// Move the upper half into a new sibling. A leaf keeps its median in
    /// the right half and copies it up; an internal node moves it up.
    fn split(&mut self, limits: NodeLimits) -> Split<K, V> {
        let left_len = (self.len() - 1) / 2;

        if self.is_leaf() {
            let mut right = Node::new_leaf(limits);
            right.keys.extend(self.keys.drain(left_len..));
            right.values.extend(self.values.drain(left_len..));
            let separator = right.keys[0].clone();
            return Split { separator, right };
        }

        let mut keys = Vec::with_capacity(limits.max_keys + 1);
        keys.extend(self.keys.drain(left_len + 1..));
        let mut children = Vec::with_capacity(limits.max_keys + 2);
        children.extend(self.children.drain(left_len + 1..));
        let separator = self.keys.pop().expect("split node holds its median");
        Split {
            separator,
            right: Node {
                keys,
                values: Vec::new(),
                children,
            },
        }
    }
}

#[cfg(feature = "diagnostics")]
impl<K: std::fmt::Debug, V: std::fmt::Debug> Node<K, V> {
    pub(crate) fn snapshot(&self) -> crate::diagnostics::TreeNode {
        crate::diagnostics::TreeNode {
            is_leaf: self.is_leaf(),
            keys: self.keys.iter().map(|key| format!("{key:?}")).collect(),
            values: self.values.iter().map(|value| format!("{value:?}")).collect(),
            children: self.children.iter().map(Node::snapshot).collect(),
        }
    }
}

#[cfg(test)]
impl<K: Ord + std::fmt::Debug, V> Node<K, V> {
    /// Check ordering, routing, occupancy and equal leaf depth; returns
    /// `(entry count, leaf depth)` of the subtree
    pub(crate) fn check_invariants(&self, limits: NodeLimits, is_root: bool) -> (usize, usize) {
        assert!(self.len() <= limits.max_keys, "node overfull: {:?}", self.keys);
        if !is_root {
            assert!(self.len() >= limits.min_keys, "node underfull: {:?}", self.keys);
        }
        assert!(
            self.keys.windows(2).all(|pair| pair[0] < pair[1]),
            "keys not strictly increasing: {:?}",
            self.keys
        );

        if self.is_leaf() {
            assert_eq!(self.keys.len(), self.values.len());
            return (self.len(), 1);
        }

        assert!(self.values.is_empty());
        assert_eq!(self.children.len(), self.len() + 1);
        let mut total = 0;
        let mut depth = None;
        for (index, child) in self.children.iter().enumerate() {
            if index > 0 {
                let separator = &self.keys[index - 1];
                assert!(child.min().is_some_and(|(min, _)| min >= separator));
            }
            if let Some(separator) = self.keys.get(index) {
                assert!(child.max().is_some_and(|(max, _)| max < separator));
            }
            let (count, child_depth) = child.check_invariants(limits, false);
            total += count;
            match depth {
                None => depth = Some(child_depth),
                Some(expected) => assert_eq!(expected, child_depth, "leaves at unequal depth"),
            }
        }
        (total, depth.unwrap_or(0) + 1)
    }
}
