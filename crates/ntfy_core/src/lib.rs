//! Local subscription and notification store for an ntfy client.
//!
//! [`Repository`] is the entry point for callers; it mediates every access
//! to the SQLite-backed stores in [`store`].

pub mod db;
pub mod logging;
pub mod model;
pub mod repository;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::notification::Notification;
pub use model::subscription::{
    NewSubscription, Subscription, SubscriptionId, SubscriptionWithMetadata,
};
pub use model::validation::{normalize_base_url, ValidationError};
pub use repository::{LiveResults, Repository, RepositoryCell, RepositoryError, RepositoryResult};
pub use store::{
    open_stores, LiveQuery, NotificationStore, SharedConnection, SqliteNotificationStore,
    SqliteSubscriptionStore, StoreChange, StoreError, StoreOptions, StoreResult,
    SubscriptionStore,
};

