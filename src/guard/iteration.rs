//! Active-iteration counter.

use crate::error::{Result, TreeError};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts the traversals currently running over one tree
#[derive(Debug, Default)]
pub(crate) struct IterationCounter {
    active: AtomicUsize,
}

impl IterationCounter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a traversal; it ends when the returned guard is dropped
    pub(crate) fn enter(&self) -> IterationGuard<'_> {
        self.active.fetch_add(1, Ordering::AcqRel);
        IterationGuard { counter: self }
    }

    /// Number of traversals in progress
    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Fail fast if a mutation would run underneath a traversal
    pub(crate) fn ensure_idle(&self) -> Result<()> {
        match self.active() {
            0 => Ok(()),
            n => Err(TreeError::illegal_state(format!(
                "modification while {n} traversal(s) are active"
            ))),
        }
    }
}

/// Marks a traversal as active for as long as it lives.
///
/// Dropping the guard (on completion, cancellation or unwinding) releases it.
#[derive(Debug)]
pub struct IterationGuard<'a> {
    counter: &'a IterationCounter,
}

impl Drop for IterationGuard<'_> {
    fn drop(&mut self) {
        self.counter.active.fetch_sub(1, Ordering::AcqRel);
    }
}
