//! SQLite-backed subscription store.

use crate::model::subscription::{NewSubscription, SubscriptionId, SubscriptionWithMetadata};
use crate::model::validation::{check_base_url, check_topic, normalize_base_url};
use crate::store::change_feed::StoreChange;
use crate::store::live::{watch, LiveQuery};
use crate::store::shared::SharedConnection;
use crate::store::{StoreError, StoreResult, SubscriptionStore};
use log::{debug, info};
use rusqlite::{params, Connection, Row};
use std::sync::Arc;

// Rollups come from a LEFT JOIN so subscriptions without notifications
// still list with `notifications = 0` and `last_active = 0`.
const SUBSCRIPTION_SELECT_SQL: &str = "SELECT
    s.id AS id,
    s.base_url AS base_url,
    s.topic AS topic,
    COUNT(n.id) AS notifications,
    IFNULL(MAX(n.timestamp), 0) AS last_active
FROM subscriptions AS s
LEFT JOIN notifications AS n ON n.subscription_id = s.id";

pub struct SqliteSubscriptionStore {
    db: Arc<SharedConnection>,
}

impl SqliteSubscriptionStore {
    pub fn new(db: Arc<SharedConnection>) -> Self {
        Self { db }
    }
}

impl SubscriptionStore for SqliteSubscriptionStore {
    fn list(&self) -> StoreResult<Vec<SubscriptionWithMetadata>> {
        self.db.with_conn(list_subscriptions)
    }

    fn list_flow(self: Arc<Self>) -> LiveQuery<Vec<SubscriptionWithMetadata>> {
        let changes = self.db.subscribe_changes();
        watch(changes, |_| true, move || self.list())
    }

    fn get(&self, base_url: &str, topic: &str) -> StoreResult<Option<SubscriptionWithMetadata>> {
        let base_url = normalize_base_url(base_url);
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SUBSCRIPTION_SELECT_SQL}
                 WHERE s.base_url = ?1 AND s.topic = ?2
                 GROUP BY s.id;"
            ))?;
            let mut rows = stmt.query(params![base_url, topic])?;
            if let Some(row) = rows.next()? {
                return Ok(Some(parse_subscription_row(row)?));
            }
            Ok(None)
        })
    }

    fn add(&self, subscription: &NewSubscription) -> StoreResult<SubscriptionId> {
        subscription.validate()?;
        let base_url = normalize_base_url(&subscription.base_url);

        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO subscriptions (id, base_url, topic) VALUES (?1, ?2, ?3);",
                params![subscription.id, base_url, subscription.topic],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        info!("event=subscription_add module=store status=ok subscription_id={id}");
        self.db.publish(StoreChange::SubscriptionAdded(id));
        Ok(id)
    }

    fn remove(&self, id: SubscriptionId) -> StoreResult<()> {
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM subscriptions WHERE id = ?1;", [id])?)
        })?;

        if changed == 0 {
            debug!("event=subscription_remove module=store status=noop subscription_id={id}");
            return Ok(());
        }

        info!("event=subscription_remove module=store status=ok subscription_id={id}");
        self.db.publish(StoreChange::SubscriptionRemoved(id));
        Ok(())
    }
}

fn list_subscriptions(conn: &Connection) -> StoreResult<Vec<SubscriptionWithMetadata>> {
    let mut stmt = conn.prepare(&format!(
        "{SUBSCRIPTION_SELECT_SQL}
         GROUP BY s.id
         ORDER BY last_active DESC, s.id ASC;"
    ))?;
    let mut rows = stmt.query([])?;
    let mut subscriptions = Vec::new();
    while let Some(row) = rows.next()? {
        subscriptions.push(parse_subscription_row(row)?);
    }
    Ok(subscriptions)
}

fn parse_subscription_row(row: &Row<'_>) -> StoreResult<SubscriptionWithMetadata> {
    let id: SubscriptionId = row.get("id")?;
    let base_url: String = row.get("base_url")?;
    let topic: String = row.get("topic")?;
    check_base_url(&base_url).map_err(|err| {
        StoreError::InvalidData(format!("subscriptions.base_url of row {id}: {err}"))
    })?;
    check_topic(&topic).map_err(|err| {
        StoreError::InvalidData(format!("subscriptions.topic of row {id}: {err}"))
    })?;

    let count: i64 = row.get("notifications")?;
    let notifications = u32::try_from(count).map_err(|_| {
        StoreError::InvalidData(format!("notification count `{count}` out of range"))
    })?;

    Ok(SubscriptionWithMetadata {
        id,
        base_url,
        topic,
        last_active: row.get("last_active")?,
        notifications,
    })
}
