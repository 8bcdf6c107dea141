use ntfy_core::db::open_db_in_memory;
use ntfy_core::{
    open_stores, NewSubscription, Notification, NotificationStore, SharedConnection,
    SqliteNotificationStore, SqliteSubscriptionStore, StoreChange, StoreError, StoreOptions,
    SubscriptionStore, ValidationError,
};
use std::collections::HashSet;
use std::sync::Arc;

fn stores() -> (Arc<SqliteSubscriptionStore>, Arc<SqliteNotificationStore>) {
    open_stores(open_db_in_memory().unwrap(), StoreOptions::default())
}

#[test]
fn add_assigns_id_when_absent_and_keeps_caller_id() {
    let (subscriptions, _) = stores();

    let assigned = subscriptions
        .add(&NewSubscription::new("https://ntfy.sh", "alerts"))
        .unwrap();
    let chosen = subscriptions
        .add(&NewSubscription::with_id(4242, "https://ntfy.sh", "backups"))
        .unwrap();

    assert!(assigned > 0);
    assert_eq!(chosen, 4242);
    assert_eq!(
        subscriptions.get("https://ntfy.sh", "backups").unwrap().unwrap().id,
        4242
    );
}

#[test]
fn get_normalizes_base_url_and_returns_none_when_missing() {
    let (subscriptions, _) = stores();
    subscriptions
        .add(&NewSubscription::new("https://ntfy.sh/", "alerts"))
        .unwrap();

    let found = subscriptions.get("https://ntfy.sh/", "alerts").unwrap().unwrap();
    assert_eq!(found.base_url, "https://ntfy.sh");
    assert!(subscriptions.get("https://ntfy.sh", "other").unwrap().is_none());
}

#[test]
fn duplicate_base_url_and_topic_is_a_constraint_violation() {
    let (subscriptions, _) = stores();
    subscriptions
        .add(&NewSubscription::new("https://ntfy.sh", "alerts"))
        .unwrap();

    let err = subscriptions
        .add(&NewSubscription::new("https://ntfy.sh/", "alerts"))
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

#[test]
fn invalid_subscription_fields_are_rejected_before_write() {
    let (subscriptions, _) = stores();

    let bad_url = subscriptions
        .add(&NewSubscription::new("ntfy.sh", "alerts"))
        .unwrap_err();
    assert!(matches!(
        bad_url,
        StoreError::Validation(ValidationError::InvalidBaseUrl(_))
    ));

    let bad_topic = subscriptions
        .add(&NewSubscription::new("https://ntfy.sh", "no spaces"))
        .unwrap_err();
    assert!(matches!(
        bad_topic,
        StoreError::Validation(ValidationError::InvalidTopic(_))
    ));
    assert!(subscriptions.list().unwrap().is_empty());
}

#[test]
fn list_rolls_up_notification_count_and_last_activity() {
    let (subscriptions, notifications) = stores();
    let quiet = subscriptions
        .add(&NewSubscription::new("https://ntfy.sh", "quiet"))
        .unwrap();
    let busy = subscriptions
        .add(&NewSubscription::new("https://ntfy.sh", "busy"))
        .unwrap();
    notifications
        .add(&Notification::new("a", busy, 100, "first"))
        .unwrap();
    notifications
        .add(&Notification::new("b", busy, 300, "second"))
        .unwrap();

    let rows = subscriptions.list().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, busy);
    assert_eq!(rows[0].notifications, 2);
    assert_eq!(rows[0].last_active, 300);
    assert_eq!(rows[1].id, quiet);
    assert_eq!(rows[1].notifications, 0);
    assert_eq!(rows[1].last_active, 0);
}

#[test]
fn notification_ids_are_unique_at_the_storage_layer() {
    let (subscriptions, notifications) = stores();
    let first = subscriptions
        .add(&NewSubscription::new("https://ntfy.sh", "one"))
        .unwrap();
    let second = subscriptions
        .add(&NewSubscription::new("https://ntfy.sh", "two"))
        .unwrap();
    notifications
        .add(&Notification::new("shared", first, 1, "hello"))
        .unwrap();

    let err = notifications
        .add(&Notification::new("shared", second, 2, "again"))
        .unwrap_err();
    assert!(err.is_constraint_violation());
    assert!(notifications.list_ids(second).unwrap().is_empty());
}

#[test]
fn notification_for_unknown_subscription_is_rejected() {
    let (_, notifications) = stores();
    let err = notifications
        .add(&Notification::new("orphan", 99, 1, "nobody home"))
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

#[test]
fn list_ids_and_snapshot_are_scoped_to_subscription() {
    let (subscriptions, notifications) = stores();
    let alerts = subscriptions
        .add(&NewSubscription::new("https://ntfy.sh", "alerts"))
        .unwrap();
    let other = subscriptions
        .add(&NewSubscription::new("https://ntfy.sh", "other"))
        .unwrap();
    notifications
        .add(&Notification::new("old", alerts, 10, "old").with_title("Backup"))
        .unwrap();
    notifications
        .add(&Notification::new("new", alerts, 20, "new"))
        .unwrap();
    notifications
        .add(&Notification::new("elsewhere", other, 30, "x"))
        .unwrap();

    let ids = notifications.list_ids(alerts).unwrap();
    assert_eq!(ids, HashSet::from(["old".to_string(), "new".to_string()]));

    let listed = notifications.list_snapshot(alerts).unwrap();
    let order: Vec<&str> = listed.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(order, vec!["new", "old"]);
    assert_eq!(listed[1].title, "Backup");
}

#[test]
fn removals_are_idempotent_and_silent_when_nothing_changes() {
    let (subscriptions, notifications) = stores();
    let id = subscriptions
        .add(&NewSubscription::new("https://ntfy.sh", "alerts"))
        .unwrap();
    notifications
        .add(&Notification::new("n1", id, 1, "hi"))
        .unwrap();

    notifications.remove("n1").unwrap();
    notifications.remove("n1").unwrap();
    notifications.remove_all(id).unwrap();
    subscriptions.remove(id).unwrap();
    subscriptions.remove(id).unwrap();
    subscriptions.remove(12345).unwrap();

    assert!(subscriptions.list().unwrap().is_empty());
    assert!(notifications.get("n1").unwrap().is_none());
}

#[test]
fn removing_subscription_cascades_to_notifications() {
    let (subscriptions, notifications) = stores();
    let id = subscriptions
        .add(&NewSubscription::new("https://ntfy.sh", "alerts"))
        .unwrap();
    notifications
        .add(&Notification::new("n1", id, 1, "one"))
        .unwrap();
    notifications
        .add(&Notification::new("n2", id, 2, "two"))
        .unwrap();

    subscriptions.remove(id).unwrap();

    assert!(notifications.get("n1").unwrap().is_none());
    assert!(notifications.get("n2").unwrap().is_none());
    assert!(notifications.list_ids(id).unwrap().is_empty());
}

#[test]
fn mutations_publish_changes_and_noops_publish_nothing() {
    let shared = SharedConnection::new(open_db_in_memory().unwrap(), StoreOptions::default());
    let subscriptions = SqliteSubscriptionStore::new(Arc::clone(&shared));
    let notifications = SqliteNotificationStore::new(Arc::clone(&shared));
    let mut changes = shared.subscribe_changes();

    let id = subscriptions
        .add(&NewSubscription::new("https://ntfy.sh", "alerts"))
        .unwrap();
    notifications
        .add(&Notification::new("n1", id, 1, "one"))
        .unwrap();
    notifications.remove("missing").unwrap();
    notifications.remove_all(id + 1).unwrap();
    notifications.remove("n1").unwrap();
    subscriptions.remove(id).unwrap();
    subscriptions.remove(id).unwrap();

    let mut seen = Vec::new();
    while let Ok(change) = changes.try_recv() {
        seen.push(change);
    }
    assert_eq!(
        seen,
        vec![
            StoreChange::SubscriptionAdded(id),
            StoreChange::NotificationsChanged { subscription_id: id },
            StoreChange::NotificationsChanged { subscription_id: id },
            StoreChange::SubscriptionRemoved(id),
        ]
    );
}

#[test]
fn corrupt_rows_are_reported_instead_of_masked() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO subscriptions (id, base_url, topic) VALUES (1, 'not a url', 'alerts');",
        [],
    )
    .unwrap();
    let (subscriptions, _) = open_stores(conn, StoreOptions::default());

    let err = subscriptions.list().unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
}
