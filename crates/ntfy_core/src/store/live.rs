//! Live queries: snapshot streams re-run on relevant store changes.
//!
//! # Invariants
//! - Nothing is queried until the stream is first polled.
//! - The first item is the current state; each later item is a complete
//!   snapshot taken at or after the change that triggered it.
//! - Changes queued while a query runs collapse into one re-query.

use crate::store::change_feed::StoreChange;
use crate::store::{StoreError, StoreResult};
use futures::stream::{self, BoxStream, StreamExt};
use log::debug;
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;

/// Continuously-updating query result.
pub type LiveQuery<T> = BoxStream<'static, StoreResult<T>>;

struct Watch<F, Q> {
    changes: Receiver<StoreChange>,
    is_relevant: F,
    query: Arc<Q>,
    primed: bool,
}

/// Builds a live query from a change receiver, a relevance filter and the
/// snapshot query.
///
/// The receiver should be opened when the caller asks for the stream so
/// that changes racing with the first poll still trigger a refresh.
pub(crate) fn watch<T, F, Q>(
    changes: Receiver<StoreChange>,
    is_relevant: F,
    query: Q,
) -> LiveQuery<T>
where
    T: Send + 'static,
    F: Fn(&StoreChange) -> bool + Send + 'static,
    Q: Fn() -> StoreResult<T> + Send + Sync + 'static,
{
    let state = Watch {
        changes,
        is_relevant,
        query: Arc::new(query),
        primed: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.primed && !state.next_relevant_change().await {
            return None;
        }
        state.primed = true;

        let query = Arc::clone(&state.query);
        let snapshot = run_blocking(move || (*query)()).await;
        Some((snapshot, state))
    })
    .boxed()
}

impl<F, Q> Watch<F, Q>
where
    F: Fn(&StoreChange) -> bool,
{
    /// Waits for a change worth re-querying. Returns `false` once the feed
    /// is closed.
    async fn next_relevant_change(&mut self) -> bool {
        loop {
            match self.changes.recv().await {
                Ok(change) if (self.is_relevant)(&change) => break,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("event=live_query module=store status=lagged skipped={skipped}");
                    break;
                }
                Err(RecvError::Closed) => return false,
            }
        }

        loop {
            match self.changes.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        true
    }
}

/// Runs a blocking store call on the tokio blocking pool.
pub(crate) async fn run_blocking<T, F>(task: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| StoreError::Worker(err.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::watch;
    use crate::store::change_feed::{ChangeFeed, StoreChange};
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn query_runs_lazily_and_refreshes_on_relevant_changes() {
        let feed = ChangeFeed::new(8);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut live = watch(
            feed.subscribe(),
            |change| matches!(change, StoreChange::SubscriptionAdded(_)),
            move || Ok(counter.fetch_add(1, Ordering::SeqCst)),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(live.next().await.unwrap().unwrap(), 0);

        feed.publish(StoreChange::NotificationsChanged { subscription_id: 1 });
        feed.publish(StoreChange::SubscriptionAdded(1));
        assert_eq!(live.next().await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn queued_changes_collapse_into_one_refresh() {
        let feed = ChangeFeed::new(8);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut live = watch(
            feed.subscribe(),
            |_| true,
            move || Ok(counter.fetch_add(1, Ordering::SeqCst)),
        );
        live.next().await.unwrap().unwrap();

        for id in 0..5 {
            feed.publish(StoreChange::SubscriptionAdded(id));
        }
        assert_eq!(live.next().await.unwrap().unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn lagged_receiver_still_refreshes() {
        let feed = ChangeFeed::new(1);
        let mut live = watch(feed.subscribe(), |_| false, || Ok(()));
        live.next().await.unwrap().unwrap();

        feed.publish(StoreChange::SubscriptionAdded(1));
        feed.publish(StoreChange::SubscriptionAdded(2));
        assert!(live.next().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn stream_ends_when_feed_is_dropped() {
        let feed = ChangeFeed::new(4);
        let mut live = watch(feed.subscribe(), |_| true, || Ok(()));
        live.next().await.unwrap().unwrap();

        drop(feed);
        assert!(live.next().await.is_none());
    }
}
