use crate::binding::{BindableTarget, BindingKind};
use crate::builder::AddressSpaceBuilder;
use crate::coerce::{coerce, CoercionError};
use crate::config::FilterPolicy;
use crate::error::OscQueryError;
use crate::snapshot::{Snapshot, SnapshotCell};
use crate::subscription::{ConnectionId, FeedbackCache, FeedbackSink, SubscriptionTable};
use crate::value::Value;
use oscq_codec::{decode_packet, encode, OscArg};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// What an inbound message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Applied,
    Invoked,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The coordinating core shared by every transport.
///
/// Owns the current snapshot, the subscription table and the feedback cache.
/// Lock order is always subscriptions, then cache.
pub struct ProtocolRouter {
    root: RwLock<Option<Arc<dyn BindableTarget>>>,
    path_prefix: String,
    builder: AddressSpaceBuilder,
    snapshot: SnapshotCell,
    subscriptions: Mutex<SubscriptionTable>,
    cache: Mutex<FeedbackCache>,
}

impl ProtocolRouter {
    pub fn new(root: Option<Arc<dyn BindableTarget>>, filter: FilterPolicy, path_prefix: &str) -> Self {
        Self {
            root: RwLock::new(root),
            path_prefix: path_prefix.to_string(),
            builder: AddressSpaceBuilder::new(filter),
            snapshot: SnapshotCell::new(),
            subscriptions: Mutex::new(SubscriptionTable::new()),
            cache: Mutex::new(FeedbackCache::new()),
        }
    }

    /// Replaces the target graph. Takes effect on the next rebuild.
    pub fn set_root(&self, root: Option<Arc<dyn BindableTarget>>) {
        *self.root.write().unwrap_or_else(PoisonError::into_inner) = root;
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load()
    }

    /// Builds from the current root and publishes the result. Readers keep
    /// whichever snapshot they already loaded. Returns the new generation.
    pub fn rebuild_snapshot(&self) -> u64 {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner).clone();
        let snapshot = match root {
            Some(target) => self.builder.build(target.as_ref(), &self.path_prefix),
            None => {
                tracing::warn!("Router: no root target configured, publishing an empty address space");
                Snapshot::empty()
            }
        };
        let bindings = snapshot.len();
        let generation = self.snapshot.publish(snapshot);
        tracing::info!("Router: snapshot {} published ({} bindings)", generation, bindings);
        generation
    }

    /// Routes one decoded message to its binding.
    pub fn handle_incoming_message(&self, address: &str, args: &[OscArg]) -> Result<Dispatch, OscQueryError> {
        let snapshot = self.snapshot.load();
        let Some(binding) = snapshot.binding(address) else {
            tracing::warn!("Router: binding not found for address {}", address);
            return Err(OscQueryError::BindingNotFound(address.to_string()));
        };

        if binding.kind() == BindingKind::Invoke {
            binding.invoke().map_err(|source| {
                tracing::warn!("Router: invoke failed for {}: {}", address, source);
                OscQueryError::Binding { path: address.to_string(), source }
            })?;
            tracing::debug!("Router: invoked {}", address);
            return Ok(Dispatch::Invoked);
        }

        let value = coerce(binding.value_type(), args).map_err(|source| {
            tracing::warn!("Router: type not handled for {}: {}", address, source);
            match source {
                CoercionError::EnumMismatch(value) => OscQueryError::EnumMismatch {
                    path: address.to_string(),
                    value,
                },
                source => OscQueryError::UnsupportedType {
                    path: address.to_string(),
                    source,
                },
            }
        })?;

        binding.set(value).map_err(|source| {
            tracing::warn!("Router: set failed for {}: {}", address, source);
            OscQueryError::Binding { path: address.to_string(), source }
        })?;
        tracing::debug!("Router: applied {}", address);
        Ok(Dispatch::Applied)
    }

    /// Decodes a datagram (message or bundle) and routes every message in it.
    /// Returns how many messages were applied; per-message failures are logged
    /// and skipped.
    pub fn handle_packet(&self, bytes: &[u8]) -> Result<usize, OscQueryError> {
        let packet = decode_packet(bytes).map_err(|e| {
            tracing::warn!("Router: dropping packet: {}", e);
            OscQueryError::from(e)
        })?;
        let applied = packet
            .into_messages()
            .iter()
            .filter(|msg| self.handle_incoming_message(&msg.address, &msg.args).is_ok())
            .count();
        Ok(applied)
    }

    pub fn open_connection(&self, sink: Arc<dyn FeedbackSink>) -> ConnectionId {
        let id = lock(&self.subscriptions).open(sink);
        tracing::debug!("Router: {} opened", id);
        id
    }

    /// Unknown paths are kept: a later rebuild may make them valid.
    pub fn listen(&self, id: ConnectionId, path: &str) {
        if self.snapshot.load().binding(path).is_none() {
            tracing::debug!("Router: {} listens to {} which is not bound yet", id, path);
        }
        if !lock(&self.subscriptions).listen(id, path) {
            tracing::debug!("Router: LISTEN {} from {} changed nothing", path, id);
        }
    }

    pub fn ignore(&self, id: ConnectionId, path: &str) {
        if !lock(&self.subscriptions).ignore(id, path) {
            tracing::debug!("Router: IGNORE {} from {} changed nothing", path, id);
        }
    }

    /// Drops every subscription of the connection. After this returns no tick
    /// will touch its sink again.
    pub fn on_connection_closed(&self, id: ConnectionId) {
        if lock(&self.subscriptions).close(id) {
            tracing::debug!("Router: {} closed", id);
        }
    }

    pub fn close_all_connections(&self) {
        let n = lock(&self.subscriptions).close_all();
        lock(&self.cache).retain_paths(&BTreeSet::new());
        if n > 0 {
            tracing::info!("Router: dropped {} subscriber connection(s)", n);
        }
    }

    pub fn subscriptions_of(&self, id: ConnectionId) -> BTreeSet<String> {
        lock(&self.subscriptions).paths_of(id)
    }

    pub fn connection_count(&self) -> usize {
        lock(&self.subscriptions).connection_count()
    }

    /// One feedback pass. Returns the number of packets handed to sinks.
    ///
    /// Values are read without holding any lock; sends happen under the
    /// subscription lock so a concurrent close is never followed by a send.
    pub fn tick(&self) -> usize {
        let snapshot = self.snapshot.load();
        let paths = lock(&self.subscriptions).subscribed_paths();

        let observed: Vec<(String, Value)> = paths
            .iter()
            .filter_map(|path| {
                let binding = snapshot.binding(path)?;
                binding.get().map(|value| (path.clone(), value))
            })
            .collect();

        let mut subscriptions = lock(&self.subscriptions);
        let mut cache = lock(&self.cache);
        let mut sent = 0;
        let mut dead = Vec::new();

        for (path, value) in observed {
            let changed = cache.differs(&path, &value);
            let mut packet = None;

            for (id, sink, fresh) in subscriptions.listeners(&path) {
                if !changed && !fresh {
                    continue;
                }
                let bytes = packet.get_or_insert_with(|| encode(&path, &value.to_osc_args())).clone();
                if sink.send(bytes) {
                    sent += 1;
                } else {
                    dead.push(id);
                }
                subscriptions.mark_delivered(id, &path);
            }

            if changed {
                cache.record(&path, value);
            }
        }

        for id in dead {
            tracing::debug!("Router: {} sink is gone, dropping its subscriptions", id);
            subscriptions.close(id);
        }
        cache.retain_paths(&subscriptions.subscribed_paths());
        sent
    }
}
