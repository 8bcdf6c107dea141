//! Mutation events published by the SQLite stores.

use crate::model::subscription::SubscriptionId;
use tokio::sync::broadcast;

/// One committed row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    SubscriptionAdded(SubscriptionId),
    /// Also implies the subscription's notifications are gone.
    SubscriptionRemoved(SubscriptionId),
    NotificationsChanged { subscription_id: SubscriptionId },
}

impl StoreChange {
    /// Returns whether the notification list of `subscription_id` may differ
    /// after this change.
    pub fn touches_notifications_of(&self, subscription_id: SubscriptionId) -> bool {
        match *self {
            Self::SubscriptionAdded(_) => false,
            Self::SubscriptionRemoved(id) => id == subscription_id,
            Self::NotificationsChanged {
                subscription_id: id,
            } => id == subscription_id,
        }
    }
}

/// Broadcast fan-out of [`StoreChange`] events.
///
/// Publishing never blocks; slow receivers observe `Lagged` instead of
/// holding writers back.
#[derive(Debug)]
pub struct ChangeFeed {
    sender: broadcast::Sender<StoreChange>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes one change. Having no live receivers is not an error.
    pub fn publish(&self, change: StoreChange) {
        let _ = self.sender.send(change);
    }

    /// Opens a receiver that sees every change published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
