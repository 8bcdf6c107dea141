//! Domain model for subscriptions and their notifications.
//!
//! # Invariants
//! - `(base_url, topic)` identifies a subscription naturally; `id` is the
//!   store-assigned surrogate key used by notification rows.
//! - Notification ids are producer-assigned and unique across all
//!   subscriptions.

pub mod notification;
pub mod subscription;
pub mod validation;
