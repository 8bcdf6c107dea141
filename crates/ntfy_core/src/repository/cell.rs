//! Single-instance holder for the process-wide [`Repository`].

use crate::repository::Repository;
use crate::store::{NotificationStore, SubscriptionStore};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Owned by the composition root; hands out one shared [`Repository`].
///
/// # Invariants
/// - The first `get_or_init` call constructs the repository; concurrent
///   first calls construct at most once.
/// - Later calls return the same instance and drop the handles passed in.
#[derive(Default)]
pub struct RepositoryCell {
    instance: OnceCell<Arc<Repository>>,
}

impl RepositoryCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_init(
        &self,
        subscriptions: Arc<dyn SubscriptionStore>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Arc<Repository> {
        let repository = self
            .instance
            .get_or_init(|| Arc::new(Repository::new(subscriptions, notifications)));
        Arc::clone(repository)
    }

    /// Returns the repository if it was already constructed.
    pub fn get(&self) -> Option<Arc<Repository>> {
        self.instance.get().cloned()
    }
}
