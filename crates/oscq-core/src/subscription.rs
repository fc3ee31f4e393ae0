use crate::value::Value;
use bytes::Bytes;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Outbound half of a subscriber connection.
pub trait FeedbackSink: Send + Sync {
    /// Queues one OSC packet. Returns `false` once the connection is gone.
    fn send(&self, packet: Bytes) -> bool;
}

struct Subscriber {
    sink: Arc<dyn FeedbackSink>,
    paths: HashSet<String>,
    /// Listened to but not yet delivered.
    fresh: HashSet<String>,
}

/// Per-connection listen sets. Dropping a connection drops all its paths at once.
#[derive(Default)]
pub struct SubscriptionTable {
    connections: HashMap<ConnectionId, Subscriber>,
    next_id: u64,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, sink: Arc<dyn FeedbackSink>) -> ConnectionId {
        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        self.connections.insert(
            id,
            Subscriber {
                sink,
                paths: HashSet::new(),
                fresh: HashSet::new(),
            },
        );
        id
    }

    /// Returns whether the connection existed.
    pub fn close(&mut self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }

    pub fn close_all(&mut self) -> usize {
        let n = self.connections.len();
        self.connections.clear();
        n
    }

    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Returns whether the path was newly added.
    pub fn listen(&mut self, id: ConnectionId, path: &str) -> bool {
        let Some(sub) = self.connections.get_mut(&id) else {
            return false;
        };
        let added = sub.paths.insert(path.to_string());
        if added {
            sub.fresh.insert(path.to_string());
        }
        added
    }

    /// Returns whether the path was being listened to.
    pub fn ignore(&mut self, id: ConnectionId, path: &str) -> bool {
        let Some(sub) = self.connections.get_mut(&id) else {
            return false;
        };
        sub.fresh.remove(path);
        sub.paths.remove(path)
    }

    pub fn paths_of(&self, id: ConnectionId) -> BTreeSet<String> {
        self.connections
            .get(&id)
            .map(|sub| sub.paths.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Union of every connection's listen set.
    pub fn subscribed_paths(&self) -> BTreeSet<String> {
        self.connections
            .values()
            .flat_map(|sub| sub.paths.iter().cloned())
            .collect()
    }

    /// Connections listening on `path`, each with its "not yet delivered" flag.
    pub(crate) fn listeners(&self, path: &str) -> Vec<(ConnectionId, Arc<dyn FeedbackSink>, bool)> {
        let mut out: Vec<_> = self
            .connections
            .iter()
            .filter(|(_, sub)| sub.paths.contains(path))
            .map(|(id, sub)| (*id, Arc::clone(&sub.sink), sub.fresh.contains(path)))
            .collect();
        out.sort_by_key(|(id, _, _)| *id);
        out
    }

    pub(crate) fn mark_delivered(&mut self, id: ConnectionId, path: &str) {
        if let Some(sub) = self.connections.get_mut(&id) {
            sub.fresh.remove(path);
        }
    }
}

/// Last value pushed per path, to any subscriber. Only used to suppress repeats.
#[derive(Debug, Default)]
pub struct FeedbackCache {
    last: HashMap<String, Value>,
}

impl FeedbackCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// No entry counts as "different".
    pub fn differs(&self, path: &str, value: &Value) -> bool {
        self.last.get(path).map_or(true, |last| !last.same_as(value))
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.last.get(path)
    }

    pub fn record(&mut self, path: &str, value: Value) {
        self.last.insert(path.to_string(), value);
    }

    /// Forgets paths nobody listens to any more.
    pub fn retain_paths(&mut self, live: &BTreeSet<String>) {
        self.last.retain(|path, _| live.contains(path));
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
