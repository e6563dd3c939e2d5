//! Count change observers.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Callback = Arc<dyn Fn(usize) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registered count observers
#[derive(Default)]
pub(crate) struct CountObservers {
    callbacks: Mutex<Vec<(SubscriptionId, Callback)>>,
    next_id: AtomicU64,
}

impl CountObservers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.lock().push((id, Arc::new(callback)));
        id
    }

    /// Returns false if the subscription was not registered
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Invoke every observer with the new count.
    ///
    /// Runs on a snapshot so observers may (un)subscribe; a panicking
    /// observer is logged and skipped.
    pub(crate) fn notify(&self, count: usize) {
        let snapshot: Vec<(SubscriptionId, Callback)> = {
            let callbacks = self.callbacks.lock();
            if callbacks.is_empty() {
                return;
            }
            callbacks.clone()
        };

        for (id, callback) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(count))).is_err() {
                tracing::warn!("count observer {:?} panicked, ignoring", id);
            }
        }
    }
}
