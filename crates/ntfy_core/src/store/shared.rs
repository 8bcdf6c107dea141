//! Connection handle shared by the subscription and notification stores.

use crate::store::change_feed::{ChangeFeed, StoreChange};
use crate::store::{StoreError, StoreResult};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const DEFAULT_CHANGE_BUFFER: usize = 64;

/// Tuning knobs for the SQLite stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Broadcast capacity of the change feed. Receivers further behind than
    /// this observe a lag and re-query.
    pub change_buffer: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            change_buffer: DEFAULT_CHANGE_BUFFER,
        }
    }
}

/// One SQLite connection plus the change feed its writers publish into.
///
/// Access to the connection is serialized by a mutex; this is the only
/// mutual exclusion in the stack.
#[derive(Debug)]
pub struct SharedConnection {
    conn: Mutex<Connection>,
    changes: ChangeFeed,
}

impl SharedConnection {
    /// Wraps a connection returned by [`crate::db::open_db`] or
    /// [`crate::db::open_db_in_memory`].
    pub fn new(conn: Connection, options: StoreOptions) -> Arc<Self> {
        Arc::new(Self {
            conn: Mutex::new(conn),
            changes: ChangeFeed::new(options.change_buffer),
        })
    }

    /// Runs `f` while holding the connection lock.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    pub(crate) fn publish(&self, change: StoreChange) {
        self.changes.publish(change);
    }

    /// Opens a receiver for changes committed from now on.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
