use std::sync::Arc;

use serde_json::Value;
use tokio::{
    sync::{Mutex, broadcast, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use feed_core::{FeedUpdate, Message, StoreError};
use feed_store::{FeedQuery, FieldFilter, QuerySnapshot, RemoteStore, SubscriptionHandle};

use crate::MESSAGES_ROOT;

/// Default number of messages fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// Stream of ordered feed updates for controller subscribers.
pub type FeedUpdateStream = broadcast::Receiver<FeedUpdate>;

const UPDATE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
struct ActiveFeed {
    room_id: String,
    limit: usize,
    handle: SubscriptionHandle,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the single live feed subscription for one room view.
///
/// The window limit starts at one page, grows by exactly one page per
/// [`load_more`](Self::load_more), and resets when a different room is
/// opened. The previous subscription is always torn down before its
/// replacement is created, so two live listeners never race on the view.
pub struct PaginationController {
    store: Arc<dyn RemoteStore>,
    page_size: usize,
    updates_tx: broadcast::Sender<FeedUpdate>,
    active: Mutex<Option<ActiveFeed>>,
}

impl PaginationController {
    /// Create a controller over `store` with the given page size (clamped to
    /// at least 1).
    pub fn new(store: Arc<dyn RemoteStore>, page_size: usize) -> Self {
        let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            store,
            page_size: page_size.max(1),
            updates_tx,
            active: Mutex::new(None),
        }
    }

    /// Subscribe to ordered feed updates.
    pub fn updates(&self) -> FeedUpdateStream {
        self.updates_tx.subscribe()
    }

    /// Configured page size.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Open the feed for `room_id` with a fresh one-page window, replacing
    /// any existing subscription (same or different room).
    pub async fn open(&self, room_id: impl Into<String>) -> Result<(), StoreError> {
        self.reopen(room_id.into(), self.page_size).await
    }

    /// Grow the window by one page size and re-subscribe.
    ///
    /// Returns `false` without any store interaction when no feed is open.
    pub async fn load_more(&self) -> Result<bool, StoreError> {
        let target = {
            let active = self.active.lock().await;
            active
                .as_ref()
                .map(|feed| (feed.room_id.clone(), feed.limit + self.page_size))
        };

        match target {
            Some((room_id, limit)) => {
                self.reopen(room_id, limit).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Tear down the live subscription. Safe to call when none is active.
    pub async fn close(&self) {
        let previous = self.active.lock().await.take();
        if let Some(feed) = previous {
            self.teardown(feed).await;
        }
    }

    async fn reopen(&self, room_id: String, limit: usize) -> Result<(), StoreError> {
        let mut active = self.active.lock().await;

        // The old subscription must be fully gone before the new one exists;
        // otherwise a stale snapshot could still reach the view.
        if let Some(previous) = active.take() {
            self.teardown(previous).await;
        }

        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let handle = self
            .store
            .subscribe(feed_query(&room_id, limit), snapshot_tx)
            .await?;

        let stop = CancellationToken::new();
        let task = tokio::spawn(deliver_snapshots(
            snapshot_rx,
            stop.child_token(),
            room_id.clone(),
            self.page_size,
            self.updates_tx.clone(),
        ));

        debug!(room_id = %room_id, limit, "feed subscription opened");
        *active = Some(ActiveFeed {
            room_id,
            limit,
            handle,
            stop,
            task,
        });
        Ok(())
    }

    async fn teardown(&self, feed: ActiveFeed) {
        feed.stop.cancel();
        if let Err(err) = self.store.unsubscribe(feed.handle).await {
            warn!(room_id = %feed.room_id, error = %err, "feed unsubscribe failed");
        }
        let _ = feed.task.await;
        debug!(room_id = %feed.room_id, "feed subscription closed");
    }
}

impl Drop for PaginationController {
    fn drop(&mut self) {
        // Real teardown is the async `close`; here we only stop the local
        // worker. The store prunes the subscription once the sink closes.
        if let Ok(mut active) = self.active.try_lock()
            && let Some(feed) = active.take()
        {
            feed.stop.cancel();
            feed.task.abort();
        }
    }
}

async fn deliver_snapshots(
    mut snapshots: mpsc::UnboundedReceiver<QuerySnapshot>,
    stop: CancellationToken,
    room_id: String,
    page_size: usize,
    updates_tx: broadcast::Sender<FeedUpdate>,
) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            snapshot = snapshots.recv() => {
                let Some(snapshot) = snapshot else { break };
                let messages = ordered_messages(&room_id, snapshot);
                let can_load_more = messages.len() >= page_size;
                trace!(
                    room_id = %room_id,
                    count = messages.len(),
                    can_load_more,
                    "feed snapshot delivered"
                );
                let _ = updates_tx.send(FeedUpdate {
                    room_id: room_id.clone(),
                    messages,
                    can_load_more,
                });
            }
        }
    }
}

/// Convert the store's map-of-records into id-tagged messages ordered
/// ascending by creation time (ties broken by id for determinism).
fn ordered_messages(room_id: &str, snapshot: QuerySnapshot) -> Vec<Message> {
    let mut messages: Vec<Message> = snapshot
        .records
        .into_iter()
        .filter_map(|(id, value)| match serde_json::from_value(value) {
            Ok(record) => Some(Message { id, record }),
            Err(err) => {
                warn!(
                    room_id = %room_id,
                    message_id = %id,
                    error = %err,
                    "skipping malformed feed record"
                );
                None
            }
        })
        .collect();

    messages.sort_by(|left, right| {
        left.record
            .created_at
            .cmp(&right.record.created_at)
            .then_with(|| left.id.cmp(&right.id))
    });
    messages
}

fn feed_query(room_id: &str, limit: usize) -> FeedQuery {
    FeedQuery {
        path: MESSAGES_ROOT.to_owned(),
        filter: FieldFilter {
            field: "roomId".to_owned(),
            equals: Value::String(room_id.to_owned()),
        },
        order_by: "createdAt".to_owned(),
        limit_to_last: limit,
    }
}
