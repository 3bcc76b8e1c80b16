use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::trace;

use feed_core::StoreError;

use crate::{
    AtomicUpdate, FeedQuery, QuerySnapshot, RemoteStore, SnapshotSink, SubscriptionHandle,
};

/// In-memory [`RemoteStore`] holding one JSON tree behind a mutex.
///
/// Commits and snapshot fan-out happen under the same lock, so subscribers
/// observe multi-path updates only as a whole. Snapshots are re-delivered
/// only when a commit actually changes the query result.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

struct StoreInner {
    root: Value,
    subscriptions: HashMap<u64, Subscription>,
    next_handle: u64,
    external_objects: HashSet<String>,
}

impl Default for StoreInner {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
            subscriptions: HashMap::new(),
            next_handle: 1,
            external_objects: HashSet::new(),
        }
    }
}

struct Subscription {
    query: FeedQuery,
    sink: SnapshotSink,
    last_sent: Option<QuerySnapshot>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a value at `path` outside any subscription flow. Intended for
    /// test fixtures and demo seeding; subscribers are notified normally.
    pub fn seed(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        write_path(&mut inner.root, path, Some(value));
        notify_subscribers(&mut inner);
        Ok(())
    }

    /// Read the node at `path`, when present. Test/demo convenience.
    pub fn read_value(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.lock()?;
        Ok(read_path(&inner.root, path).cloned())
    }

    /// Register an external object so [`RemoteStore::delete_external_object`]
    /// can succeed for it.
    pub fn put_external_object(&self, reference: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.external_objects.insert(reference.to_owned());
        Ok(())
    }

    /// Whether an external object is currently stored.
    pub fn has_external_object(&self, reference: &str) -> Result<bool, StoreError> {
        let inner = self.lock()?;
        Ok(inner.external_objects.contains(reference))
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("poisoned store lock".to_owned()))
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn subscribe(
        &self,
        query: FeedQuery,
        sink: SnapshotSink,
    ) -> Result<SubscriptionHandle, StoreError> {
        let mut inner = self.lock()?;
        let raw = inner.next_handle;
        inner.next_handle += 1;

        let snapshot = evaluate_query(&inner.root, &query);
        if sink.send(snapshot.clone()).is_err() {
            trace!(handle = raw, "sink closed before initial snapshot; not registering");
            return Ok(SubscriptionHandle::new(raw));
        }

        inner.subscriptions.insert(
            raw,
            Subscription {
                query,
                sink,
                last_sent: Some(snapshot),
            },
        );
        Ok(SubscriptionHandle::new(raw))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.subscriptions.remove(&handle.raw());
        Ok(())
    }

    async fn run_atomic(
        &self,
        path: &str,
        update: AtomicUpdate<'_>,
    ) -> Result<Option<Value>, StoreError> {
        let mut inner = self.lock()?;
        let current = read_path(&inner.root, path).cloned();
        let committed = update(current.clone());

        // A single lock serializes writers, so the first attempt commits;
        // the purity contract on `update` still holds for stores that retry.
        if committed != current {
            write_path(&mut inner.root, path, committed.clone());
            notify_subscribers(&mut inner);
        }
        Ok(committed)
    }

    async fn apply_multi_path_update(
        &self,
        updates: HashMap<String, Option<Value>>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        for (path, value) in updates {
            write_path(&mut inner.root, &path, value);
        }
        notify_subscribers(&mut inner);
        Ok(())
    }

    async fn delete_external_object(&self, reference: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.external_objects.remove(reference) {
            Ok(())
        } else {
            Err(StoreError::Backend(format!(
                "no external object at '{reference}'"
            )))
        }
    }
}

fn notify_subscribers(inner: &mut StoreInner) {
    let root = inner.root.clone();
    inner.subscriptions.retain(|handle, subscription| {
        let snapshot = evaluate_query(&root, &subscription.query);
        if subscription.last_sent.as_ref() == Some(&snapshot) {
            return true;
        }
        match subscription.sink.send(snapshot.clone()) {
            Ok(()) => {
                subscription.last_sent = Some(snapshot);
                true
            }
            Err(_) => {
                trace!(handle, "pruning subscription with closed sink");
                false
            }
        }
    });
}

fn evaluate_query(root: &Value, query: &FeedQuery) -> QuerySnapshot {
    let mut matched: Vec<(String, Value)> = Vec::new();
    if let Some(Value::Object(children)) = read_path(root, &query.path) {
        for (id, record) in children {
            if record.get(&query.filter.field) == Some(&query.filter.equals) {
                matched.push((id.clone(), record.clone()));
            }
        }
    }

    matched.sort_by(|(left_id, left), (right_id, right)| {
        compare_order_values(left.get(&query.order_by), right.get(&query.order_by))
            .then_with(|| left_id.cmp(right_id))
    });

    let skip = matched.len().saturating_sub(query.limit_to_last.max(1));
    let mut records = Map::new();
    for (id, record) in matched.into_iter().skip(skip) {
        records.insert(id, record);
    }
    QuerySnapshot { records }
}

fn compare_order_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(left)), Some(Value::Number(right))) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(left)), Some(Value::String(right))) => left.cmp(right),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

fn read_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for segment in split_path(path) {
        node = node.as_object()?.get(segment)?;
    }
    Some(node)
}

fn write_path(root: &mut Value, path: &str, value: Option<Value>) {
    match value {
        Some(value) => insert_at(root, path, value),
        None => remove_at(root, path),
    }
}

fn insert_at(root: &mut Value, path: &str, value: Value) {
    let segments = split_path(path);
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Some(map) = node.as_object_mut() else {
            return;
        };
        node = map.entry((*segment).to_owned()).or_insert(Value::Null);
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Some(map) = node.as_object_mut() {
        map.insert((*last).to_owned(), value);
    }
}

fn remove_at(root: &mut Value, path: &str) {
    let segments = split_path(path);
    let Some((last, parents)) = segments.split_last() else {
        *root = Value::Object(Map::new());
        return;
    };

    let mut node = root;
    for segment in parents {
        match node.as_object_mut().and_then(|map| map.get_mut(*segment)) {
            Some(child) => node = child,
            None => return,
        }
    }

    if let Some(map) = node.as_object_mut() {
        map.remove(*last);
    }
}
