use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::error::StoreError;

/// Path-addressed realtime state shared by every client in a room.
///
/// Paths are `/`-separated keys. Writing `Value::Null` or deleting removes the subtree;
/// empty objects do not exist. Subscriptions receive the full value under their path on
/// open and after every change that touches it (at least once, possibly repeated).
pub trait SharedStore {
    fn read(&self, path: &str) -> Result<Option<Value>, StoreError>;
    fn write(&self, path: &str, value: Value) -> Result<(), StoreError>;
    fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;
    fn delete(&self, path: &str) -> Result<(), StoreError>;
    fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;
    fn remove_on_disconnect(&self, path: &str) -> Result<(), StoreError>;
}

/// Live view of one path. Dropping it unsubscribes.
pub struct Subscription {
    path: String,
    events: UnboundedReceiver<Option<Value>>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        path: impl Into<String>,
        events: UnboundedReceiver<Option<Value>>,
        cancel: Box<dyn FnOnce() + Send>,
    ) -> Self {
        Self {
            path: path.into(),
            events,
            cancel: Some(cancel),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next delivered snapshot, if one is queued.
    pub fn try_next(&mut self) -> Option<Option<Value>> {
        self.events.try_recv().ok()
    }

    pub async fn next(&mut self) -> Option<Option<Value>> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

fn segments(path: &str) -> Result<Vec<String>, StoreError> {
    let segs: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if segs.is_empty() || segs.iter().any(|s| s == "." || s == "..") {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segs)
}

fn lookup<'a>(root: &'a Value, segs: &[String]) -> Option<&'a Value> {
    segs.iter().try_fold(root, |node, seg| node.get(seg.as_str()))
}

fn insert(root: &mut Value, segs: &[String], value: Value) {
    let mut node = root;
    for seg in &segs[..segs.len() - 1] {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        node = map
            .entry(seg.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        map.insert(segs[segs.len() - 1].clone(), value);
    }
}

// Removes the subtree and prunes parents left empty. Returns whether anything was removed.
fn remove(node: &mut Value, segs: &[String]) -> bool {
    let Value::Object(map) = node else {
        return false;
    };
    if segs.len() == 1 {
        return map.remove(&segs[0]).is_some();
    }
    let Some(child) = map.get_mut(&segs[0]) else {
        return false;
    };
    let removed = remove(child, &segs[1..]);
    if removed && child.as_object().map(|m| m.is_empty()).unwrap_or(false) {
        map.remove(&segs[0]);
    }
    removed
}

fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let pruned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune(v).map(|v| (k, v)))
                .collect();
            if pruned.is_empty() {
                None
            } else {
                Some(Value::Object(pruned))
            }
        }
        other => Some(other),
    }
}

fn overlaps(a: &[String], b: &[String]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

struct Subscriber {
    id: u64,
    client: u64,
    segs: Vec<String>,
    tx: UnboundedSender<Option<Value>>,
}

struct Tree {
    root: Value,
    subscribers: Vec<Subscriber>,
    on_disconnect: HashMap<u64, Vec<Vec<String>>>,
    disconnected: Vec<u64>,
    next_subscriber: u64,
    next_client: u64,
    next_push: u64,
}

impl Tree {
    fn notify(&mut self, changed: &[String]) {
        let root = &self.root;
        self.subscribers.retain(|sub| {
            if !overlaps(&sub.segs, changed) {
                return true;
            }
            sub.tx.send(lookup(root, &sub.segs).cloned()).is_ok()
        });
    }

    fn set(&mut self, segs: &[String], value: Value) {
        match prune(value) {
            Some(value) => insert(&mut self.root, segs, value),
            None => {
                remove(&mut self.root, segs);
            }
        }
        self.notify(segs);
    }
}

/// In-process store shared by any number of clients.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tree>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Tree {
                root: Value::Object(Map::new()),
                subscribers: Vec::new(),
                on_disconnect: HashMap::new(),
                disconnected: Vec::new(),
                next_subscriber: 1,
                next_client: 1,
                next_push: 1,
            })),
        }
    }

    pub fn connect(&self) -> MemoryClient {
        let mut tree = self.inner.lock();
        let id = tree.next_client;
        tree.next_client += 1;
        MemoryClient {
            store: self.clone(),
            client: id,
        }
    }

    /// Reads without going through a client.
    pub fn snapshot(&self, path: &str) -> Option<Value> {
        let segs = segments(path).ok()?;
        lookup(&self.inner.lock().root, &segs).cloned()
    }
}

#[derive(Clone)]
pub struct MemoryClient {
    store: MemoryStore,
    client: u64,
}

impl MemoryClient {
    pub fn id(&self) -> u64 {
        self.client
    }

    fn live(&self) -> Result<parking_lot::MutexGuard<'_, Tree>, StoreError> {
        let tree = self.store.inner.lock();
        if tree.disconnected.contains(&self.client) {
            return Err(StoreError::Disconnected);
        }
        Ok(tree)
    }

    /// Drops the connection: runs the registered removals and closes this client's
    /// subscriptions. Further calls fail with `Disconnected`.
    pub fn disconnect(&self) {
        let mut tree = self.store.inner.lock();
        if tree.disconnected.contains(&self.client) {
            return;
        }
        tree.disconnected.push(self.client);
        let client = self.client;
        tree.subscribers.retain(|sub| sub.client != client);
        let removals = tree.on_disconnect.remove(&client).unwrap_or_default();
        for segs in removals {
            if remove(&mut tree.root, &segs) {
                tree.notify(&segs);
            }
        }
        debug!(client, "store client disconnected");
    }
}

impl SharedStore for MemoryClient {
    fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segs = segments(path)?;
        let tree = self.live()?;
        Ok(lookup(&tree.root, &segs).cloned())
    }

    fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let segs = segments(path)?;
        self.live()?.set(&segs, value);
        Ok(())
    }

    fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let mut segs = segments(path)?;
        let mut tree = self.live()?;
        // Zero-padded so keys sort in push order.
        let key = format!("k{:012}", tree.next_push);
        tree.next_push += 1;
        segs.push(key.clone());
        tree.set(&segs, value);
        Ok(key)
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let segs = segments(path)?;
        let mut tree = self.live()?;
        if remove(&mut tree.root, &segs) {
            tree.notify(&segs);
        }
        Ok(())
    }

    fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let segs = segments(path)?;
        let mut tree = self.live()?;
        let (tx, rx) = unbounded_channel();
        let _ = tx.send(lookup(&tree.root, &segs).cloned());
        let id = tree.next_subscriber;
        tree.next_subscriber += 1;
        tree.subscribers.push(Subscriber {
            id,
            client: self.client,
            segs,
            tx,
        });
        let inner = self.store.inner.clone();
        Ok(Subscription::new(
            path,
            rx,
            Box::new(move || inner.lock().subscribers.retain(|sub| sub.id != id)),
        ))
    }

    fn remove_on_disconnect(&self, path: &str) -> Result<(), StoreError> {
        let segs = segments(path)?;
        let mut tree = self.live()?;
        tree.on_disconnect.entry(self.client).or_default().push(segs);
        Ok(())
    }
}
