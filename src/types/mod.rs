//! Common types used by both tree variants.

mod compare;
mod nearest;

pub use compare::Comparable;
pub(crate) use compare::exceeds_upper;
pub use nearest::Nearest;

use crate::error::{Result, TreeError};
use serde::{Deserialize, Serialize};

/// Default branching factor, a compromise between fan-out and per-node scan cost
pub const DEFAULT_BRANCHING_FACTOR: usize = 64;

/// Smallest branching factor a tree accepts; lower values are raised to this
pub const MIN_BRANCHING_FACTOR: usize = 3;

/// Tree configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeConfig {
    /// Maximum number of children per internal node
    pub branching_factor: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            branching_factor: DEFAULT_BRANCHING_FACTOR,
        }
    }
}

impl TreeConfig {
    /// Create a new config, clamping the branching factor to the minimum
    pub fn new(branching_factor: usize) -> Self {
        Self {
            branching_factor: branching_factor.max(MIN_BRANCHING_FACTOR),
        }
    }

    /// Set the branching factor
    pub fn branching_factor(mut self, branching_factor: usize) -> Self {
        self.branching_factor = branching_factor.max(MIN_BRANCHING_FACTOR);
        self
    }

    /// Parse a config from JSON, e.g. `{"branchingFactor": 16}`
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TreeConfig = serde_json::from_str(json)
            .map_err(|e| TreeError::invalid_argument(format!("tree config: {e}")))?;
        Ok(Self::new(config.branching_factor))
    }

    pub(crate) fn limits(&self) -> NodeLimits {
        NodeLimits::new(self.branching_factor)
    }
}

/// Occupancy bounds derived from the branching factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeLimits {
    /// A node holding more keys than this must split
    pub max_keys: usize,
    /// A non-root node holding fewer keys than this has underflowed
    pub min_keys: usize,
}

impl NodeLimits {
    pub(crate) fn new(branching_factor: usize) -> Self {
        let branching_factor = branching_factor.max(MIN_BRANCHING_FACTOR);
        Self {
            max_keys: branching_factor - 1,
            min_keys: (branching_factor - 1) / 2,
        }
    }
}

/// Outcome of a push traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// Every entry in range was visited, or the upper bound was reached
    Completed,
    /// The visitor asked to stop
    Canceled,
}

impl Traversal {
    /// Check whether the visitor stopped the traversal
    pub fn is_canceled(self) -> bool {
        self == Self::Canceled
    }
}

/// Why a recursive traversal stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Halt {
    UpperBound,
    Visitor,
}

impl Halt {
    pub(crate) fn into_traversal(flow: std::ops::ControlFlow<Halt>) -> Traversal {
        match flow {
            std::ops::ControlFlow::Break(Halt::Visitor) => Traversal::Canceled,
            _ => Traversal::Completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_clamps_branching_factor() {
        assert_eq!(TreeConfig::new(0).branching_factor, MIN_BRANCHING_FACTOR);
        assert_eq!(TreeConfig::new(2).branching_factor, MIN_BRANCHING_FACTOR);
        assert_eq!(TreeConfig::new(7).branching_factor, 7);
        assert_eq!(TreeConfig::default().branching_factor, 64);
        assert_eq!(TreeConfig::default().branching_factor(1).branching_factor, 3);
    }

    #[test]
    fn test_config_from_json() {
        let config = TreeConfig::from_json(r#"{"branchingFactor": 16}"#).unwrap();
        assert_eq!(config.branching_factor, 16);

        let config = TreeConfig::from_json(r#"{"branchingFactor": 1}"#).unwrap();
        assert_eq!(config.branching_factor, 3);

        let err = TreeConfig::from_json(r#"{"fanout": 16}"#).unwrap_err();
        assert!(matches!(err, TreeError::InvalidArgument(_)));

        let json = serde_json::to_string(&TreeConfig::new(5)).unwrap();
        assert_eq!(json, r#"{"branchingFactor":5}"#);
    }

    #[test]
    fn test_node_limits() {
        let limits = NodeLimits::new(3);
        assert_eq!(limits.max_keys, 2);
        assert_eq!(limits.min_keys, 1);

        let limits = NodeLimits::new(64);
        assert_eq!(limits.max_keys, 63);
        assert_eq!(limits.min_keys, 31);
    }

    #[test]
    fn test_halt_into_traversal() {
        use std::ops::ControlFlow;
        assert_eq!(Halt::into_traversal(ControlFlow::Continue(())), Traversal::Completed);
        assert_eq!(Halt::into_traversal(ControlFlow::Break(Halt::UpperBound)), Traversal::Completed);
        assert_eq!(Halt::into_traversal(ControlFlow::Break(Halt::Visitor)), Traversal::Canceled);
        assert!(Traversal::Canceled.is_canceled());
    }
}
