//! In-memory replica for testing and local development

use crate::{
    CollectionEvent, CollectionFeed, CollectionRecord, KeyWatch, Namespace, Replica, ReplicaError,
    Result,
};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

type SlotId = (Namespace, String);

#[derive(Default)]
struct KeySlot {
    value: Option<Bytes>,
    watchers: Vec<mpsc::UnboundedSender<Option<Bytes>>>,
}

#[derive(Default)]
struct CollectionLog {
    records: Vec<CollectionRecord>,
    subscribers: Vec<mpsc::UnboundedSender<CollectionEvent>>,
}

struct Shared {
    public_token: String,
    keys: DashMap<SlotId, KeySlot>,
    collections: DashMap<SlotId, Mutex<CollectionLog>>,
    offline: AtomicBool,
}

/// An in-memory replica.
///
/// Clones share the stored data *and* the authenticated namespaces. Use
/// [`MemoryReplica::connect`] to open another connection to the same data,
/// e.g. to act as a second user.
#[derive(Clone)]
pub struct MemoryReplica {
    shared: Arc<Shared>,
    authenticated: Arc<RwLock<HashSet<Namespace>>>,
}

impl MemoryReplica {
    /// Create an empty replica whose public namespace accepts `public_token`
    pub fn new(public_token: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                public_token: public_token.into(),
                keys: DashMap::new(),
                collections: DashMap::new(),
                offline: AtomicBool::new(false),
            }),
            authenticated: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// A fresh, unauthenticated connection to the same data
    pub fn connect(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            authenticated: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Simulate losing the network: every call fails with `Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of live watchers on `key`, for asserting unsubscription
    pub fn watcher_count(&self, namespace: &Namespace, key: &str) -> usize {
        self.shared
            .keys
            .get(&(namespace.clone(), key.to_string()))
            .map(|slot| slot.watchers.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    fn check(&self, namespace: &Namespace) -> Result<()> {
        if self.shared.offline.load(Ordering::SeqCst) {
            return Err(ReplicaError::Unavailable("replica is offline".to_string()));
        }
        if !self.authenticated.read().contains(namespace) {
            return Err(ReplicaError::Unauthenticated(namespace.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl Replica for MemoryReplica {
    async fn authenticate(&self, namespace: &Namespace, token: &str) -> Result<()> {
        if self.shared.offline.load(Ordering::SeqCst) {
            return Err(ReplicaError::Unavailable("replica is offline".to_string()));
        }
        let accepted = match namespace {
            Namespace::Public => token == self.shared.public_token,
            Namespace::User(_) => !token.is_empty(),
        };
        if !accepted {
            return Err(ReplicaError::CredentialRejected {
                namespace: namespace.clone(),
                reason: "invalid token".to_string(),
            });
        }
        self.authenticated.write().insert(namespace.clone());
        debug!(%namespace, "authenticated");
        Ok(())
    }

    async fn put(&self, namespace: &Namespace, key: &str, value: Bytes) -> Result<()> {
        self.check(namespace)?;
        let mut slot = self
            .shared
            .keys
            .entry((namespace.clone(), key.to_string()))
            .or_default();
        slot.value = Some(value.clone());
        slot.watchers
            .retain(|tx| tx.send(Some(value.clone())).is_ok());
        Ok(())
    }

    async fn watch(&self, namespace: &Namespace, key: &str) -> Result<KeyWatch> {
        self.check(namespace)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut slot = self
            .shared
            .keys
            .entry((namespace.clone(), key.to_string()))
            .or_default();
        // the receiver is alive, so the initial send cannot fail
        let _ = tx.send(slot.value.clone());
        slot.watchers.retain(|tx| !tx.is_closed());
        slot.watchers.push(tx);
        Ok(KeyWatch::new(rx))
    }

    async fn append(
        &self,
        namespace: &Namespace,
        collection: &str,
        key: &str,
        value: Bytes,
    ) -> Result<()> {
        self.check(namespace)?;
        let entry = self
            .shared
            .collections
            .entry((namespace.clone(), collection.to_string()))
            .or_default();
        let mut log = entry.lock();
        let record = CollectionRecord {
            key: key.to_string(),
            value,
        };
        log.subscribers
            .retain(|tx| tx.send(CollectionEvent::Record(record.clone())).is_ok());
        log.records.push(record);
        Ok(())
    }

    async fn subscribe(&self, namespace: &Namespace, collection: &str) -> Result<CollectionFeed> {
        self.check(namespace)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let entry = self
            .shared
            .collections
            .entry((namespace.clone(), collection.to_string()))
            .or_default();
        let mut log = entry.lock();
        for record in &log.records {
            let _ = tx.send(CollectionEvent::Record(record.clone()));
        }
        let _ = tx.send(CollectionEvent::SnapshotComplete);
        log.subscribers.push(tx);
        debug!(%namespace, collection, replayed = log.records.len(), "collection subscribed");
        Ok(CollectionFeed::new(rx))
    }
}
