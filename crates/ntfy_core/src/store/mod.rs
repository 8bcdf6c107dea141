//! Store layer: durable subscription and notification tables.
//!
//! # Responsibility
//! - Define the table access contracts consumed by [`crate::Repository`].
//! - Keep SQL details behind the SQLite implementations.
//! - Publish a [`StoreChange`] for every committed mutation so live queries
//!   can refresh.
//!
//! # Invariants
//! - Write paths validate model fields before SQL mutations.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - Removing a missing row is a no-op and publishes nothing.
//! - Notification id uniqueness is enforced by the `notifications` primary
//!   key, not only by callers.

use crate::db::DbError;
use crate::model::notification::Notification;
use crate::model::subscription::{NewSubscription, SubscriptionId, SubscriptionWithMetadata};
use crate::model::validation::ValidationError;
use rusqlite::Connection;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod change_feed;
pub mod live;
mod notification_store;
mod shared;
mod subscription_store;

pub use change_feed::{ChangeFeed, StoreChange};
pub use live::LiveQuery;
pub use notification_store::SqliteNotificationStore;
pub use shared::{SharedConnection, StoreOptions};
pub use subscription_store::SqliteSubscriptionStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level failure for table reads and writes.
#[derive(Debug)]
pub enum StoreError {
    Validation(ValidationError),
    Db(DbError),
    InvalidData(String),
    /// A previous holder of the connection lock panicked.
    LockPoisoned,
    /// A blocking query task panicked or was cancelled.
    Worker(String),
}

impl StoreError {
    /// Returns whether the underlying write hit a unique, primary or
    /// foreign key constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Db(err) if err.is_constraint_violation())
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::LockPoisoned => write!(f, "store connection lock poisoned"),
            Self::Worker(message) => write!(f, "store worker task failed: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::LockPoisoned | Self::Worker(_) => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Access to the `subscriptions` table, joined with notification rollups.
pub trait SubscriptionStore: Send + Sync {
    /// Lists all subscriptions, most recently active first.
    fn list(&self) -> StoreResult<Vec<SubscriptionWithMetadata>>;
    /// Live variant of [`SubscriptionStore::list`]; refreshes on any change,
    /// since counts and activity derive from notifications.
    fn list_flow(self: Arc<Self>) -> LiveQuery<Vec<SubscriptionWithMetadata>>;
    fn get(&self, base_url: &str, topic: &str) -> StoreResult<Option<SubscriptionWithMetadata>>;
    /// Persists a subscription and returns its id (assigned when absent).
    fn add(&self, subscription: &NewSubscription) -> StoreResult<SubscriptionId>;
    /// Deletes a subscription together with its notifications.
    fn remove(&self, id: SubscriptionId) -> StoreResult<()>;
}

/// Access to the `notifications` table.
pub trait NotificationStore: Send + Sync {
    /// Live list for one subscription, newest first.
    fn list(self: Arc<Self>, subscription_id: SubscriptionId) -> LiveQuery<Vec<Notification>>;
    /// One-shot variant of [`NotificationStore::list`].
    fn list_snapshot(&self, subscription_id: SubscriptionId) -> StoreResult<Vec<Notification>>;
    fn list_ids(&self, subscription_id: SubscriptionId) -> StoreResult<HashSet<String>>;
    fn get(&self, id: &str) -> StoreResult<Option<Notification>>;
    fn add(&self, notification: &Notification) -> StoreResult<()>;
    fn remove(&self, id: &str) -> StoreResult<()>;
    fn remove_all(&self, subscription_id: SubscriptionId) -> StoreResult<()>;
}

/// Wraps a migrated connection and returns both table stores sharing it.
pub fn open_stores(
    conn: Connection,
    options: StoreOptions,
) -> (Arc<SqliteSubscriptionStore>, Arc<SqliteNotificationStore>) {
    let shared = SharedConnection::new(conn, options);
    (
        Arc::new(SqliteSubscriptionStore::new(Arc::clone(&shared))),
        Arc::new(SqliteNotificationStore::new(shared)),
    )
}
