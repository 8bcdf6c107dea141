//! Subscription domain model.
//!
//! # Invariants
//! - `(base_url, topic)` is unique across stored subscriptions.
//! - `notifications` and `last_active` are derived from notification rows
//!   and never written directly.

use crate::model::validation::{check_base_url, check_topic, normalize_base_url, ValidationError};
use serde::{Deserialize, Serialize};

/// Store-assigned surrogate key referenced by notification rows.
pub type SubscriptionId = i64;

/// Public subscription shape handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    /// Server root, normalized without trailing `/`.
    pub base_url: String,
    /// Topic name scoped to `base_url`.
    pub topic: String,
    /// Epoch seconds of the newest notification, `0` when there is none.
    pub last_active: i64,
    /// Number of stored notifications.
    pub notifications: u32,
}

/// Store row joined with notification rollups.
///
/// Kept distinct from [`Subscription`] so the store view can grow columns
/// without leaking them to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionWithMetadata {
    pub id: SubscriptionId,
    pub base_url: String,
    pub topic: String,
    pub last_active: i64,
    pub notifications: u32,
}

impl From<SubscriptionWithMetadata> for Subscription {
    fn from(row: SubscriptionWithMetadata) -> Self {
        Self {
            id: row.id,
            base_url: row.base_url,
            topic: row.topic,
            last_active: row.last_active,
            notifications: row.notifications,
        }
    }
}

/// Input for subscription creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscription {
    /// Caller-chosen id, or `None` to let the store assign one.
    pub id: Option<SubscriptionId>,
    pub base_url: String,
    pub topic: String,
}

impl NewSubscription {
    /// Creates a subscription request with a store-assigned id.
    ///
    /// `base_url` is normalized; validation happens on write.
    pub fn new(base_url: impl AsRef<str>, topic: impl Into<String>) -> Self {
        Self {
            id: None,
            base_url: normalize_base_url(base_url.as_ref()),
            topic: topic.into(),
        }
    }

    /// Creates a subscription request with a caller-provided id.
    pub fn with_id(
        id: SubscriptionId,
        base_url: impl AsRef<str>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id),
            ..Self::new(base_url, topic)
        }
    }

    /// Checks the fields as they will be stored (base URL normalized).
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_base_url(&normalize_base_url(&self.base_url))?;
        check_topic(&self.topic)
    }
}
