//! B-tree node: items double as separators.
//!
//! A node holds its items in ascending order. An internal node owns
//! `items.len() + 1` children; every item in `children[i]` is less than
//! `items[i]` and every item in `children[i + 1]` is greater.

use crate::types::{exceeds_upper, Comparable, Halt, Nearest, NodeLimits};
use std::cmp::Ordering;
use std::mem;
use std::ops::ControlFlow;

#[derive(Debug)]
pub(crate) struct Node<T> {
    pub(super) items: Vec<T>,
    /// Empty for leaves
    pub(super) children: Vec<Node<T>>,
}

/// Right half produced when a node overflows
pub(crate) struct Split<T> {
    pub separator: T,
    pub right: Node<T>,
}

pub(crate) struct InsertOutcome<T> {
    pub updated: bool,
    pub split: Option<Split<T>>,
}

impl<T> InsertOutcome<T> {
    fn updated() -> Self {
        Self {
            updated: true,
            split: None,
        }
    }

    fn inserted(split: Option<Split<T>>) -> Self {
        Self {
            updated: false,
            split,
        }
    }
}

impl<T> Node<T> {
    pub(crate) fn new_leaf(limits: NodeLimits) -> Self {
        Self {
            items: Vec::with_capacity(limits.max_keys + 1),
            children: Vec::new(),
        }
    }

    /// New root above a split: `left < separator < right`
    pub(crate) fn new_root(left: Node<T>, separator: T, right: Node<T>, limits: NodeLimits) -> Self {
        let mut items = Vec::with_capacity(limits.max_keys + 1);
        items.push(separator);
        let mut children = Vec::with_capacity(limits.max_keys + 2);
        children.push(left);
        children.push(right);
        Self { items, children }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Take the only child of an emptied internal root
    pub(crate) fn into_only_child(mut self) -> Node<T> {
        debug_assert!(self.items.is_empty() && self.children.len() == 1);
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

    /// Index of the first item `>= key`, or `len()` if there is none
    pub(crate) fn find_insertion_point<Q>(&self, key: &Q) -> usize
    where
        Q: Comparable<T> + ?Sized,
    {
        self.items
            .partition_point(|item| key.compare(item) == Ordering::Greater)
    }

    fn search<Q>(&self, key: &Q) -> (usize, bool)
    where
        Q: Comparable<T> + ?Sized,
    {
        let index = self.find_insertion_point(key);
        let found = index < self.items.len() && key.compare(&self.items[index]) == Ordering::Equal;
        (index, found)
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        Q: Comparable<T> + ?Sized,
    {
        let mut node = self;
        loop {
            let (index, found) = node.search(key);
            if found {
                return Some(&node.items[index]);
            }
            node = node.children.get(index)?;
        }
    }

    pub(crate) fn min(&self) -> Option<&T> {
        let mut node = self;
        while let Some(child) = node.children.first() {
            node = child;
        }
        node.items.first()
    }

    pub(crate) fn max(&self) -> Option<&T> {
        let mut node = self;
        while let Some(child) = node.children.last() {
            node = child;
        }
        node.items.last()
    }

    pub(crate) fn nearest<Q>(&self, key: &Q) -> Nearest<&T>
    where
        Q: Comparable<T> + ?Sized,
    {
        let (index, found) = self.search(key);
        if found {
            return Nearest::exact(&self.items[index]);
        }

        let mut nearest = match self.children.get(index) {
            Some(child) => child.nearest(key),
            None => Nearest::default(),
        };

        // The separators around the child bound it from both sides
        if nearest.exact.is_none() {
            if nearest.lower.is_none() && index > 0 {
                nearest.lower = Some(&self.items[index - 1]);
            }
            if nearest.upper.is_none() {
                nearest.upper = self.items.get(index);
            }
        }
        nearest
    }

    /// In-order visit of every item `>= lower` up to `upper`
    pub(crate) fn visit<Q, F>(
        &self,
        lower: Option<&Q>,
        upper: Option<&Q>,
        max_inclusive: bool,
        visitor: &mut F,
    ) -> ControlFlow<Halt>
    where
        Q: Comparable<T> + ?Sized,
        F: FnMut(&T) -> ControlFlow<()>,
    {
        let start = lower.map_or(0, |key| self.find_insertion_point(key));

        for index in start..=self.items.len() {
            if let Some(child) = self.children.get(index) {
                child.visit(lower, upper, max_inclusive, visitor)?;
            }
            if let Some(item) = self.items.get(index) {
                if exceeds_upper(upper, item, max_inclusive) {
                    return ControlFlow::Break(Halt::UpperBound);
                }
                if visitor(item).is_break() {
                    return ControlFlow::Break(Halt::Visitor);
                }
            }
        }
        ControlFlow::Continue(())
    }

    pub(crate) fn remove_min(&mut self, limits: NodeLimits) -> Option<T> {
        if self.is_leaf() {
            return (!self.items.is_empty()).then(|| self.items.remove(0));
        }
        let removed = self.children[0].remove_min(limits);
        if removed.is_some() {
            self.rebalance(0, limits);
        }
        removed
    }

    pub(crate) fn remove_max(&mut self, limits: NodeLimits) -> Option<T> {
        if self.is_leaf() {
            return self.items.pop();
        }
        let last = self.items.len();
        let removed = self.children[last].remove_max(limits);
        if removed.is_some() {
            self.rebalance(last, limits);
        }
        removed
    }

    /// Resolve an underflow of `children[index]` by borrowing from or
    /// merging with a sibling
    fn rebalance(&mut self, index: usize, limits: NodeLimits) {
        if self.children[index].len() >= limits.min_keys {
            return;
        }

        let has_left = index > 0;
        let has_right = index < self.items.len();

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

    /// Rotate the left sibling's max item through the parent separator
    fn borrow_from_left(&mut self, index: usize) {
        let (before, after) = self.children.split_at_mut(index);
        let left = &mut before[index - 1];
        let child = &mut after[0];

        let moved = left.items.pop().expect("left sibling has items to lend");
        let separator = mem::replace(&mut self.items[index - 1], moved);
        child.items.insert(0, separator);

        if let Some(grandchild) = left.children.pop() {
            child.children.insert(0, grandchild);
        }
    }

    /// Rotate the right sibling's min item through the parent separator
    fn borrow_from_right(&mut self, index: usize) {
        let (before, after) = self.children.split_at_mut(index + 1);
        let child = &mut before[index];
        let right = &mut after[0];

        let moved = right.items.remove(0);
        let separator = mem::replace(&mut self.items[index], moved);
        child.items.push(separator);

        if !right.is_leaf() {
            child.children.push(right.children.remove(0));
        }
    }

    /// Merge `children[index + 1]` and the separator between them into
    /// `children[index]`
    fn merge(&mut self, index: usize) {
        let right = self.children.remove(index + 1);
        let separator = self.items.remove(index);
        let left = &mut self.children[index];

        left.items.push(separator);
        left.items.extend(right.items);
        left.children.extend(right.children);

        tracing::trace!(merged_len = left.items.len(), "merged b-tree nodes");
    }
}

impl<T: Ord> Node<T> {
    pub(crate) fn insert_or_update(&mut self, item: T, limits: NodeLimits) -> InsertOutcome<T> {
        let (index, found) = self.search(&item);
        if found {
            self.items[index] = item;
            return InsertOutcome::updated();
        }

        if self.is_leaf() {
            self.items.insert(index, item);
        } else {
            let outcome = self.children[index].insert_or_update(item, limits);
            if outcome.updated {
                return outcome;
            }
            match outcome.split {
                Some(Split { separator, right }) => {
                    self.items.insert(index, separator);
                    self.children.insert(index + 1, right);
                }
                None => return InsertOutcome::inserted(None),
            }
        }

        let split = (self.items.len() > limits.max_keys).then(|| self.split(limits));
        InsertOutcome::inserted(split)
    }

    /// Move the upper half into a new sibling; the median item moves up
    fn split(&mut self, limits: NodeLimits) -> Split<T> {
        let left_len = (self.items.len() - 1) / 2;

        let mut items = Vec::with_capacity(limits.max_keys + 1);
        items.extend(self.items.drain(left_len + 1..));
        let separator = self.items.pop().expect("split node holds its median");

        let mut children = Vec::new();
        if !self.is_leaf() {
            children.reserve(limits.max_keys + 2);
            children.extend(self.children.drain(left_len + 1..));
        }

        Split {
            separator,
            right: Node { items, children },
        }
    }

    pub(crate) fn remove<Q>(&mut self, key: &Q, limits: NodeLimits) -> Option<T>
    where
        Q: Comparable<T> + ?Sized,
    {
        let (index, found) = self.search(key);

        if self.is_leaf() {
            return found.then(|| self.items.remove(index));
        }

        let removed = if found {
            // Replace with the in-order predecessor from the left subtree
            let predecessor = self.children[index]
                .remove_max(limits)
                .expect("internal node has a non-empty left subtree");
            Some(mem::replace(&mut self.items[index], predecessor))
        } else {
            self.children[index].remove(key, limits)
        };

        if removed.is_some() {
            self.rebalance(index, limits);
        }
        removed
    }
}

#[cfg(feature = "diagnostics")]
impl<T: std::fmt::Debug> Node<T> {
    pub(crate) fn snapshot(&self) -> crate::diagnostics::TreeNode {
        crate::diagnostics::TreeNode {
            is_leaf: self.is_leaf(),
            keys: self.items.iter().map(|item| format!("{item:?}")).collect(),
            values: Vec::new(),
            children: self.children.iter().map(Node::snapshot).collect(),
        }
    }
}

#[cfg(test)]
impl<T: Ord + std::fmt::Debug> Node<T> {
    /// Check ordering, occupancy and equal leaf depth; returns
    /// `(item count, leaf depth)` of the subtree
    pub(crate) fn check_invariants(&self, limits: NodeLimits, is_root: bool) -> (usize, usize) {
        assert!(self.items.len() <= limits.max_keys, "node overfull: {:?}", self.items);
        if !is_root {
            assert!(self.items.len() >= limits.min_keys, "node underfull: {:?}", self.items);
        }
        assert!(
            self.items.windows(2).all(|pair| pair[0] < pair[1]),
            "items not strictly increasing: {:?}",
            self.items
        );

        if self.is_leaf() {
            return (self.items.len(), 1);
        }

        assert_eq!(self.children.len(), self.items.len() + 1);
        let mut total = self.items.len();
        let mut depth = None;
        for (index, child) in self.children.iter().enumerate() {
            if index > 0 {
                let separator = &self.items[index - 1];
                assert!(child.min().is_some_and(|min| min > separator));
            }
            if let Some(separator) = self.items.get(index) {
                assert!(child.max().is_some_and(|max| max < separator));
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
