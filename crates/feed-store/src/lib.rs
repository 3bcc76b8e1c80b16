//! Remote feed store contract.
//!
//! The realtime store is an external collaborator: this crate pins down the
//! subscribe/transaction/multi-path surface the rest of the workspace
//! consumes, plus [`InMemoryStore`] for tests and demos.

/// In-memory [`RemoteStore`] implementation.
pub mod memory;

pub use memory::InMemoryStore;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use feed_core::StoreError;

/// Equality filter on a child field of each record under the query path.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    /// Child field to compare, for example `roomId`.
    pub field: String,
    /// Value the field must equal for the record to match.
    pub equals: Value,
}

/// Ordered, filtered, tail-limited live query over one collection path.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    /// Collection path, for example `/messages`.
    pub path: String,
    /// Record filter.
    pub filter: FieldFilter,
    /// Child field defining the order, for example `createdAt`.
    pub order_by: String,
    /// Keep only the last N records in that order.
    pub limit_to_last: usize,
}

/// Raw query result: the store's native map of record id to record value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    /// Matched records, keyed by their store-assigned id.
    pub records: serde_json::Map<String, Value>,
}

/// Opaque identifier for one live query subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Wrap a store-assigned raw id.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The store-assigned raw id.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Pure read-modify-write body executed by [`RemoteStore::run_atomic`].
///
/// The store may invoke it several times when a conflicting write lands
/// between read and commit, so it must be free of side effects. `None` is
/// "node absent" on the way in and "delete the node" on the way out;
/// returning the input unchanged commits nothing.
pub type AtomicUpdate<'a> = &'a (dyn Fn(Option<Value>) -> Option<Value> + Send + Sync);

/// Sink receiving query snapshots for the life of a subscription.
pub type SnapshotSink = mpsc::UnboundedSender<QuerySnapshot>;

/// Contract offered by the remote realtime store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Register a live query. The current result is delivered immediately,
    /// then again after every commit that changes it.
    async fn subscribe(
        &self,
        query: FeedQuery,
        sink: SnapshotSink,
    ) -> Result<SubscriptionHandle, StoreError>;

    /// Stop a subscription. Once this returns, no further snapshot is
    /// delivered for `handle`. Unknown handles are ignored.
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), StoreError>;

    /// Run an optimistic read-modify-write transaction against one path and
    /// return the committed value.
    async fn run_atomic(
        &self,
        path: &str,
        update: AtomicUpdate<'_>,
    ) -> Result<Option<Value>, StoreError>;

    /// Apply several path writes as one all-or-nothing commit. `None`
    /// values delete their node. Observers never see a partial application.
    async fn apply_multi_path_update(
        &self,
        updates: HashMap<String, Option<Value>>,
    ) -> Result<(), StoreError>;

    /// Delete an externally stored object. Separate failure domain from the
    /// record tree: callers treat failures as degradations, not rollbacks.
    async fn delete_external_object(&self, reference: &str) -> Result<(), StoreError>;
}
