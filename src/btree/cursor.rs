//! B-tree cursor for in-order iteration.
//!
//! The cursor keeps a stack with one slot index per level, from the root
//! down to the current leaf. The indices double as the path to each node,
//! so the cursor itself borrows nothing between steps.
//!
//! - Leaf level: index of the next item to yield
//! - Internal level: index of the child currently being walked; once that
//!   child is exhausted the item at the same index comes next

use super::node::Node;
use crate::types::Comparable;

#[derive(Debug, Default)]
pub(crate) struct Cursor {
    stack: Vec<usize>,
}

/// Follow `path` from the root
fn node_at<'n, T>(root: &'n Node<T>, path: &[usize]) -> &'n Node<T> {
    path.iter().fold(root, |node, &index| &node.children[index])
}

impl Cursor {
    /// Position before the smallest item
    pub(crate) fn first<T>(root: &Node<T>) -> Self {
        let mut cursor = Self::default();
        cursor.descend_to_leftmost(root);
        cursor
    }

    /// Position before the first item `>= key`
    pub(crate) fn seek<T, Q>(root: &Node<T>, key: &Q) -> Self
    where
        Q: Comparable<T> + ?Sized,
    {
        let mut stack = Vec::new();
        let mut node = root;
        loop {
            let index = node.find_insertion_point(key);
            stack.push(index);
            match node.children.get(index) {
                Some(child) => node = child,
                None => break,
            }
        }
        Self { stack }
    }

    /// Push the leftmost path below the node the stack currently points at
    fn descend_to_leftmost<T>(&mut self, root: &Node<T>) {
        let mut node = node_at(root, &self.stack);
        loop {
            self.stack.push(0);
            match node.children.first() {
                Some(child) => node = child,
                None => break,
            }
        }
    }

    /// Yield the next item in ascending order
    pub(crate) fn next<'n, T>(&mut self, root: &'n Node<T>) -> Option<&'n T> {
        loop {
            let depth = self.stack.len().checked_sub(1)?;
            let node = node_at(root, &self.stack[..depth]);
            let index = self.stack[depth];

            if node.is_leaf() {
                if index < node.len() {
                    self.stack[depth] += 1;
                    return Some(&node.items[index]);
                }
            } else if index < node.len() {
                // Child `index` is done: yield its separator, then walk the next child
                self.stack[depth] = index + 1;
                self.descend_to_leftmost(root);
                return Some(&node.items[index]);
            }

            self.stack.pop();
        }
    }

    /// Stop yielding items
    pub(crate) fn finish(&mut self) {
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::node::Split;
    use crate::types::NodeLimits;
    use std::mem;

    fn build(limits: NodeLimits, items: impl IntoIterator<Item = u32>) -> Node<u32> {
        let mut root = Node::new_leaf(limits);
        for item in items {
            if let Some(Split { separator, right }) = root.insert_or_update(item, limits).split {
                let left = mem::replace(&mut root, Node::new_leaf(limits));
                root = Node::new_root(left, separator, right, limits);
            }
        }
        root
    }

    fn drain(cursor: &mut Cursor, root: &Node<u32>) -> Vec<u32> {
        let mut items = Vec::new();
        while let Some(item) = cursor.next(root) {
            items.push(*item);
        }
        items
    }

    #[test]
    fn test_cursor_empty_tree() {
        let root: Node<u32> = Node::new_leaf(NodeLimits::new(3));
        let mut cursor = Cursor::first(&root);
        assert_eq!(cursor.next(&root), None);
        assert_eq!(cursor.next(&root), None);
    }

    #[test]
    fn test_cursor_in_order() {
        let limits = NodeLimits::new(3);
        let root = build(limits, [7, 3, 1, 5, 0, 6, 2, 4, 8]);
        assert!(root.height() > 1);

        let mut cursor = Cursor::first(&root);
        assert_eq!(drain(&mut cursor, &root), (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn test_cursor_seek() {
        let limits = NodeLimits::new(4);
        let root = build(limits, (0..100).map(|i| i * 2));

        let mut cursor = Cursor::seek(&root, &51u32);
        assert_eq!(cursor.next(&root), Some(&52));

        let mut cursor = Cursor::seek(&root, &50u32);
        let rest = drain(&mut cursor, &root);
        assert_eq!(rest, (25..100).map(|i| i * 2).collect::<Vec<_>>());

        let mut cursor = Cursor::seek(&root, &1000u32);
        assert_eq!(cursor.next(&root), None);

        let mut cursor = Cursor::seek(&root, &0u32);
        cursor.finish();
        assert_eq!(cursor.next(&root), None);
    }
}
