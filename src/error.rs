//! Error types for the ordered containers.

use thiserror::Error;

/// Result type alias for tree operations
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors that can occur when using a tree
#[derive(Error, Debug)]
pub enum TreeError {
    /// A caller-supplied argument cannot be used
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The tree is in a state that forbids the operation
    /// (e.g. a mutation while a traversal is active)
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Diagnostic export could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TreeError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an illegal state error
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalState(msg.into())
    }

    /// Check whether this error was caused by a mutation during iteration
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TreeError::illegal_state("modification during iteration");
        assert_eq!(err.to_string(), "Illegal state: modification during iteration");
        assert!(err.is_illegal_state());

        let err = TreeError::invalid_argument("bad config");
        assert_eq!(err.to_string(), "Invalid argument: bad config");
        assert!(!err.is_illegal_state());
    }
}
