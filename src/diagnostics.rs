//! Structure export for inspecting tree shape.
//!
//! Enabled with the `diagnostics` feature. Keys and values are rendered
//! with their `Debug` representation.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Node type for visualization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Whether this is a leaf node
    pub is_leaf: bool,
    /// Keys in this node (items for `OrderedTree`)
    pub keys: Vec<String>,
    /// Values (only for `OrderedMap` leaves)
    pub values: Vec<String>,
    /// Child nodes (only for interior nodes)
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Render the tree sideways: largest keys on top, one level of
    /// indentation per depth, leaf entries prefixed with `leaf`.
    pub fn pretty_string(&self) -> String {
        let mut out = String::new();
        self.pretty_print(&mut out, 0);
        out
    }

    fn pretty_print(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);

        if self.is_leaf {
            if self.keys.is_empty() {
                let _ = writeln!(out, "{indent}leaf -");
            }
            for (index, key) in self.keys.iter().enumerate().rev() {
                match self.values.get(index) {
                    Some(value) => {
                        let _ = writeln!(out, "{indent}leaf [{key}] {value}");
                    }
                    None => {
                        let _ = writeln!(out, "{indent}leaf [{key}]");
                    }
                }
            }
            return;
        }

        for (index, child) in self.children.iter().enumerate().rev() {
            child.pretty_print(out, depth + 1);
            if let Some(key) = index.checked_sub(1).and_then(|i| self.keys.get(i)) {
                let _ = writeln!(out, "{indent}[{key}]");
            }
        }
    }
}
