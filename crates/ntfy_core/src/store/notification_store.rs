//! SQLite-backed notification store.

use crate::model::notification::Notification;
use crate::model::subscription::SubscriptionId;
use crate::store::change_feed::StoreChange;
use crate::store::live::{watch, LiveQuery};
use crate::store::shared::SharedConnection;
use crate::store::{NotificationStore, StoreError, StoreResult};
use log::{debug, info};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashSet;
use std::sync::Arc;

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    subscription_id,
    timestamp,
    title,
    message
FROM notifications";

pub struct SqliteNotificationStore {
    db: Arc<SharedConnection>,
}

impl SqliteNotificationStore {
    pub fn new(db: Arc<SharedConnection>) -> Self {
        Self { db }
    }
}

impl NotificationStore for SqliteNotificationStore {
    fn list(self: Arc<Self>, subscription_id: SubscriptionId) -> LiveQuery<Vec<Notification>> {
        let changes = self.db.subscribe_changes();
        watch(
            changes,
            move |change| change.touches_notifications_of(subscription_id),
            move || self.list_snapshot(subscription_id),
        )
    }

    fn list_snapshot(&self, subscription_id: SubscriptionId) -> StoreResult<Vec<Notification>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{NOTIFICATION_SELECT_SQL}
                 WHERE subscription_id = ?1
                 ORDER BY timestamp DESC, id ASC;"
            ))?;
            let mut rows = stmt.query([subscription_id])?;
            let mut notifications = Vec::new();
            while let Some(row) = rows.next()? {
                notifications.push(parse_notification_row(row)?);
            }
            Ok(notifications)
        })
    }

    fn list_ids(&self, subscription_id: SubscriptionId) -> StoreResult<HashSet<String>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM notifications WHERE subscription_id = ?1;")?;
            let ids = stmt
                .query_map([subscription_id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<HashSet<_>>>()?;
            Ok(ids)
        })
    }

    fn get(&self, id: &str) -> StoreResult<Option<Notification>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{NOTIFICATION_SELECT_SQL} WHERE id = ?1;"))?;
            let mut rows = stmt.query([id])?;
            if let Some(row) = rows.next()? {
                return Ok(Some(parse_notification_row(row)?));
            }
            Ok(None)
        })
    }

    fn add(&self, notification: &Notification) -> StoreResult<()> {
        notification.validate()?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (
                    id,
                    subscription_id,
                    timestamp,
                    title,
                    message
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    notification.id,
                    notification.subscription_id,
                    notification.timestamp,
                    notification.title,
                    notification.message,
                ],
            )?;
            Ok(())
        })?;

        debug!(
            "event=notification_insert module=store status=ok subscription_id={}",
            notification.subscription_id
        );
        self.db.publish(StoreChange::NotificationsChanged {
            subscription_id: notification.subscription_id,
        });
        Ok(())
    }

    fn remove(&self, id: &str) -> StoreResult<()> {
        let removed_from = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "DELETE FROM notifications WHERE id = ?1 RETURNING subscription_id;",
                    [id],
                    |row| row.get::<_, SubscriptionId>(0),
                )
                .optional()?)
        })?;

        if let Some(subscription_id) = removed_from {
            debug!(
                "event=notification_remove module=store status=ok subscription_id={subscription_id}"
            );
            self.db
                .publish(StoreChange::NotificationsChanged { subscription_id });
        }
        Ok(())
    }

    fn remove_all(&self, subscription_id: SubscriptionId) -> StoreResult<()> {
        let removed = self.db.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM notifications WHERE subscription_id = ?1;",
                [subscription_id],
            )?)
        })?;

        info!(
            "event=notifications_clear module=store status=ok subscription_id={subscription_id} removed={removed}"
        );
        if removed > 0 {
            self.db
                .publish(StoreChange::NotificationsChanged { subscription_id });
        }
        Ok(())
    }
}

fn parse_notification_row(row: &Row<'_>) -> StoreResult<Notification> {
    let notification = Notification {
        id: row.get("id")?,
        subscription_id: row.get("subscription_id")?,
        timestamp: row.get("timestamp")?,
        title: row.get("title")?,
        message: row.get("message")?,
    };
    notification.validate().map_err(|err| {
        StoreError::InvalidData(format!("notifications row `{}`: {err}", notification.id))
    })?;
    Ok(notification)
}
