//! Lifecycle guards shared by both tree variants.
//!
//! - `iteration`: the active-traversal counter that rejects structural
//!   mutation while any traversal over the tree is running
//! - `observers`: count change subscribers, isolated from the mutations
//!   that notify them

mod iteration;
mod observers;

pub use iteration::IterationGuard;
pub(crate) use iteration::IterationCounter;
pub use observers::SubscriptionId;
pub(crate) use observers::CountObservers;
