//! Repository: the single mediator between callers and the stores.
//!
//! # Responsibility
//! - Reshape store rows into the public [`Subscription`] form.
//! - Gate notification inserts on id so redelivered messages never
//!   duplicate rows.
//! - Expose one-shot, async and live query styles.
//!
//! # Invariants
//! - Store failures are relayed unchanged (wrapped as read or write); there
//!   is no retry and no local recovery.
//! - Async operations run their store call on the blocking pool; callers
//!   must be inside a tokio runtime.
//! - Id uniqueness is ultimately enforced by the store's primary key; the
//!   existence check in [`Repository::add_notification`] only avoids
//!   provoking constraint errors.

mod cell;
mod error;

pub use cell::RepositoryCell;
pub use error::{RepositoryError, RepositoryResult};

use crate::model::notification::Notification;
use crate::model::subscription::{
    NewSubscription, Subscription, SubscriptionId, SubscriptionWithMetadata,
};
use crate::model::validation::normalize_base_url;
use crate::store::{NotificationStore, SubscriptionStore};
use futures::stream::{BoxStream, StreamExt};
use log::{debug, info};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Live sequence of repository snapshots.
pub type LiveResults<T> = BoxStream<'static, RepositoryResult<T>>;

pub struct Repository {
    subscriptions: Arc<dyn SubscriptionStore>,
    notifications: Arc<dyn NotificationStore>,
}

impl Repository {
    /// Creates a repository over the two table stores.
    ///
    /// Prefer [`RepositoryCell::get_or_init`] so every caller shares one
    /// instance.
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        info!("event=repository_init module=repository status=ok");
        Self {
            subscriptions,
            notifications,
        }
    }

    /// Returns all subscriptions, most recently active first.
    ///
    /// Blocks on the store; call from a worker context.
    pub fn subscriptions(&self) -> RepositoryResult<Vec<Subscription>> {
        self.subscriptions
            .list()
            .map(into_subscriptions)
            .map_err(RepositoryError::read)
    }

    /// Live variant of [`Repository::subscriptions`].
    ///
    /// Lazy and restartable: each call returns a fresh stream that queries
    /// on first poll and after every store change.
    pub fn subscriptions_live(&self) -> LiveResults<Vec<Subscription>> {
        Arc::clone(&self.subscriptions)
            .list_flow()
            .map(|snapshot| snapshot.map(into_subscriptions).map_err(RepositoryError::read))
            .boxed()
    }

    /// Looks up one subscription by its natural key.
    ///
    /// Absence is `Ok(None)`, not an error.
    pub async fn subscription(
        &self,
        base_url: &str,
        topic: &str,
    ) -> RepositoryResult<Option<Subscription>> {
        let store = Arc::clone(&self.subscriptions);
        let base_url = base_url.to_string();
        let topic = topic.to_string();
        let row = on_worker(move || store.get(&base_url, &topic))
            .await?
            .map_err(RepositoryError::read)?;
        Ok(row.map(Subscription::from))
    }

    /// Persists a subscription and returns it in public shape.
    ///
    /// Uniqueness of `(base_url, topic)` is not pre-checked here; a
    /// duplicate surfaces as [`RepositoryError::StoreWrite`]. Callers that
    /// want a friendly message check [`Repository::subscription`] first.
    pub async fn add_subscription(
        &self,
        subscription: NewSubscription,
    ) -> RepositoryResult<Subscription> {
        let store = Arc::clone(&self.subscriptions);
        let request = subscription.clone();
        let id = on_worker(move || store.add(&request))
            .await?
            .map_err(RepositoryError::write)?;

        Ok(Subscription {
            id,
            base_url: normalize_base_url(&subscription.base_url),
            topic: subscription.topic,
            last_active: 0,
            notifications: 0,
        })
    }

    /// Removes a subscription and all of its notifications. Idempotent.
    pub async fn remove_subscription(&self, id: SubscriptionId) -> RepositoryResult<()> {
        let store = Arc::clone(&self.subscriptions);
        on_worker(move || store.remove(id))
            .await?
            .map_err(RepositoryError::write)
    }

    /// Known server roots, deduplicated and sorted, for base URL pickers.
    pub fn base_urls(&self) -> RepositoryResult<Vec<String>> {
        let rows = self.subscriptions.list().map_err(RepositoryError::read)?;
        let unique: BTreeSet<String> = rows.into_iter().map(|row| row.base_url).collect();
        Ok(unique.into_iter().collect())
    }

    /// Live notification list for one subscription, in store order
    /// (newest first).
    pub fn notifications_live(
        &self,
        subscription_id: SubscriptionId,
    ) -> LiveResults<Vec<Notification>> {
        Arc::clone(&self.notifications)
            .list(subscription_id)
            .map(|snapshot| snapshot.map_err(RepositoryError::read))
            .boxed()
    }

    /// One-shot notification list for one subscription.
    pub async fn notifications(
        &self,
        subscription_id: SubscriptionId,
    ) -> RepositoryResult<Vec<Notification>> {
        let store = Arc::clone(&self.notifications);
        on_worker(move || store.list_snapshot(subscription_id))
            .await?
            .map_err(RepositoryError::read)
    }

    /// Dedup gate: returns the candidates whose id is not yet stored for
    /// `subscription_id`, preserving input order.
    ///
    /// Issues exactly one store query and writes nothing.
    pub fn only_new_notifications(
        &self,
        subscription_id: SubscriptionId,
        candidates: Vec<Notification>,
    ) -> RepositoryResult<Vec<Notification>> {
        let existing = self
            .notifications
            .list_ids(subscription_id)
            .map_err(RepositoryError::read)?;
        let total = candidates.len();
        let fresh = retain_unseen(&existing, candidates);

        debug!(
            "event=notification_filter module=repository subscription_id={subscription_id} candidates={total} fresh={}",
            fresh.len()
        );
        Ok(fresh)
    }

    /// Inserts `notification` unless a row with the same id exists.
    ///
    /// Returns `true` when a row was inserted. Two racing calls for the same
    /// new id may both pass the existence check; the loser then fails with
    /// a constraint violation from the store and exactly one row remains.
    pub async fn add_notification(&self, notification: Notification) -> RepositoryResult<bool> {
        let store = Arc::clone(&self.notifications);
        let subscription_id = notification.subscription_id;

        let inserted = on_worker(move || -> RepositoryResult<bool> {
            let existing = store.get(&notification.id).map_err(RepositoryError::read)?;
            if existing.is_some() {
                return Ok(false);
            }
            store.add(&notification).map_err(RepositoryError::write)?;
            Ok(true)
        })
        .await??;

        let status = if inserted { "ok" } else { "skipped" };
        info!(
            "event=notification_add module=repository status={status} subscription_id={subscription_id}"
        );
        Ok(inserted)
    }

    /// Stores a freshly fetched batch: runs the dedup gate, then adds each
    /// survivor. Returns the notifications actually inserted, in input
    /// order.
    ///
    /// Fails fast on the first store error; rows added before it stay.
    pub async fn add_notifications(
        &self,
        subscription_id: SubscriptionId,
        batch: Vec<Notification>,
    ) -> RepositoryResult<Vec<Notification>> {
        let store = Arc::clone(&self.notifications);
        let existing = on_worker(move || store.list_ids(subscription_id))
            .await?
            .map_err(RepositoryError::read)?;
        let fresh = retain_unseen(&existing, batch);

        let mut inserted = Vec::with_capacity(fresh.len());
        for notification in fresh {
            if self.add_notification(notification.clone()).await? {
                inserted.push(notification);
            }
        }
        Ok(inserted)
    }

    /// Removes one notification. Idempotent.
    pub async fn remove_notification(&self, id: &str) -> RepositoryResult<()> {
        let store = Arc::clone(&self.notifications);
        let id = id.to_string();
        on_worker(move || store.remove(&id))
            .await?
            .map_err(RepositoryError::write)
    }

    /// Removes every notification of a subscription. Idempotent.
    ///
    /// Runs synchronously on the calling thread and returns only after the
    /// delete committed.
    pub fn remove_all_notifications(
        &self,
        subscription_id: SubscriptionId,
    ) -> RepositoryResult<()> {
        self.notifications
            .remove_all(subscription_id)
            .map_err(RepositoryError::write)
    }
}

fn into_subscriptions(rows: Vec<SubscriptionWithMetadata>) -> Vec<Subscription> {
    rows.into_iter().map(Subscription::from).collect()
}

fn retain_unseen(existing: &HashSet<String>, candidates: Vec<Notification>) -> Vec<Notification> {
    candidates
        .into_iter()
        .filter(|candidate| !existing.contains(&candidate.id))
        .collect()
}

/// Moves a blocking store call onto the tokio blocking pool.
async fn on_worker<T, F>(task: F) -> RepositoryResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| RepositoryError::Worker(err.to_string()))
}
