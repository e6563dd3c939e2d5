//! B+tree cursor for in-order iteration.
//!
//! Like the B-tree cursor, the stack holds one index per level and doubles
//! as the path from the root. Only leaf frames yield entries; an internal
//! frame moves on to the next child once the current one is exhausted.

use super::node::{Entry, Node};
use crate::types::Comparable;

#[derive(Debug, Default)]
pub(crate) struct Cursor {
    stack: Vec<usize>,
}

fn node_at<'n, K, V>(root: &'n Node<K, V>, path: &[usize]) -> &'n Node<K, V> {
    path.iter().fold(root, |node, &index| &node.children[index])
}

impl Cursor {
    /// Position before the smallest entry
    pub(crate) fn first<K, V>(root: &Node<K, V>) -> Self {
        let mut cursor = Self::default();
        cursor.descend_to_leftmost(root);
        cursor
    }

    /// Position before the first entry with a key `>= key`
    pub(crate) fn seek<K, V, Q>(root: &Node<K, V>, key: &Q) -> Self
    where
        Q: Comparable<K> + ?Sized,
    {
        let mut stack = Vec::new();
        let mut node = root;
        while !node.is_leaf() {
            let index = node.child_index(key);
            stack.push(index);
            node = &node.children[index];
        }
        stack.push(node.find_insertion_point(key));
        Self { stack }
    }

    fn descend_to_leftmost<K, V>(&mut self, root: &Node<K, V>) {
        let mut node = node_at(root, &self.stack);
        loop {
            self.stack.push(0);
            match node.children.first() {
                Some(child) => node = child,
                None => break,
            }
        }
    }

    /// Yield the next entry in ascending key order
    pub(crate) fn next<'n, K, V>(&mut self, root: &'n Node<K, V>) -> Option<Entry<'n, K, V>> {
        loop {
            let depth = self.stack.len().checked_sub(1)?;
            let node = node_at(root, &self.stack[..depth]);
            let index = self.stack[depth];

            if node.is_leaf() {
                if index < node.len() {
                    self.stack[depth] += 1;
                    return Some((&node.keys[index], &node.values[index]));
                }
                self.stack.pop();
            } else if index < node.len() {
                self.stack[depth] = index + 1;
                self.descend_to_leftmost(root);
            } else {
                self.stack.pop();
            }
        }
    }

    pub(crate) fn finish(&mut self) {
        self.stack.clear();
    }
}
