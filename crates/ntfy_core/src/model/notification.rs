//! Notification domain model.

use crate::model::subscription::SubscriptionId;
use crate::model::validation::{check_notification_id, check_timestamp, ValidationError};
use serde::{Deserialize, Serialize};

/// A message delivered on a subscription's topic.
///
/// The id comes from the producer (server message id), so the same message
/// delivered twice carries the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub subscription_id: SubscriptionId,
    /// Epoch seconds as reported by the producer.
    pub timestamp: i64,
    /// Optional title; empty when the producer sent none.
    #[serde(default)]
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(
        id: impl Into<String>,
        subscription_id: SubscriptionId,
        timestamp: i64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            subscription_id,
            timestamp,
            title: String::new(),
            message: message.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_notification_id(&self.id)?;
        check_timestamp(self.timestamp)
    }
}
