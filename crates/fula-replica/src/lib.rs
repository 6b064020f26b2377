//! # Fula Replica
//!
//! The replicated key-value substrate that backs Fula metadata.
//!
//! The substrate is push based: reads are expressed as watches that deliver
//! the current value first and later updates after it. This crate defines
//! the interface the metadata layer consumes plus an in-memory replica.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Metadata Store               │
//! ├─────────────────────────────────────────┤
//! │             Replica Trait               │
//! ├────────────────────┬────────────────────┤
//! │   MemoryReplica    │  network replicas  │
//! └────────────────────┴────────────────────┘
//! ```
//!
//! ## Namespaces
//!
//! Every user writes into their own namespace, authenticated with a session
//! token. One shared [`Namespace::Public`] namespace is authenticated with a
//! fixed service credential and holds records anyone may read.
//!
//! ## Example
//!
//! ```rust,ignore
//! use fula_replica::{MemoryReplica, Namespace, Replica};
//!
//! let replica = MemoryReplica::new("public-token");
//! let ns = Namespace::user("ab12..");
//! replica.authenticate(&ns, "session-token").await?;
//! replica.put(&ns, "notifications/lastSeenAt", data).await?;
//! let value = replica.get_once(&ns, "notifications/lastSeenAt").await?;
//! ```

pub mod error;
pub mod memory;

pub use error::{ReplicaError, Result};
pub use memory::MemoryReplica;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// An authenticated partition of the replica
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    /// A user's private namespace, keyed by their public identity
    User(String),
    /// The shared namespace for published records
    Public,
}

impl Namespace {
    /// Namespace owned by `owner`
    pub fn user(owner: impl Into<String>) -> Self {
        Self::User(owner.into())
    }

    /// Whether this is the public namespace
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(owner) => write!(f, "user:{}", owner),
            Self::Public => f.write_str("public"),
        }
    }
}

/// A record delivered by a collection feed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionRecord {
    /// Record key within the collection
    pub key: String,
    /// Opaque record body
    pub value: Bytes,
}

/// Events on a collection feed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollectionEvent {
    /// A record, either replayed or newly appended
    Record(CollectionRecord),
    /// Every record that existed when the feed opened has been replayed
    SnapshotComplete,
}

/// A continuous watch on a single key.
///
/// The first item is the value at the time the watch was opened (`None` if
/// absent). Dropping the watch unsubscribes it.
pub struct KeyWatch {
    rx: mpsc::UnboundedReceiver<Option<Bytes>>,
}

impl KeyWatch {
    /// Wrap a receiver fed by a replica implementation
    pub fn new(rx: mpsc::UnboundedReceiver<Option<Bytes>>) -> Self {
        Self { rx }
    }

    /// Wait for the next value; `None` once the replica closed the watch
    pub async fn next(&mut self) -> Option<Option<Bytes>> {
        self.rx.recv().await
    }

    /// Resolve with the first value and unsubscribe
    pub async fn first(mut self) -> Result<Option<Bytes>> {
        self.next()
            .await
            .ok_or_else(|| ReplicaError::Closed("key watch closed before first value".to_string()))
    }
}

/// A subscription on a collection: replay, then a snapshot marker, then live appends
pub struct CollectionFeed {
    rx: mpsc::UnboundedReceiver<CollectionEvent>,
}

impl CollectionFeed {
    /// Wrap a receiver fed by a replica implementation
    pub fn new(rx: mpsc::UnboundedReceiver<CollectionEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next event; `None` once the replica closed the feed
    pub async fn next(&mut self) -> Option<CollectionEvent> {
        self.rx.recv().await
    }
}

/// Trait for replicated key-value backends
#[async_trait]
pub trait Replica: Send + Sync {
    /// Authenticate this connection for `namespace`
    async fn authenticate(&self, namespace: &Namespace, token: &str) -> Result<()>;

    /// Write a value at `key`
    async fn put(&self, namespace: &Namespace, key: &str, value: Bytes) -> Result<()>;

    /// Open a continuous watch on `key`
    async fn watch(&self, namespace: &Namespace, key: &str) -> Result<KeyWatch>;

    /// Append a record to `collection`
    async fn append(
        &self,
        namespace: &Namespace,
        collection: &str,
        key: &str,
        value: Bytes,
    ) -> Result<()>;

    /// Subscribe to every record of `collection`
    async fn subscribe(&self, namespace: &Namespace, collection: &str) -> Result<CollectionFeed>;

    /// One-shot read: first value of a watch, which is dropped right after
    async fn get_once(&self, namespace: &Namespace, key: &str) -> Result<Option<Bytes>> {
        self.watch(namespace, key).await?.first().await
    }
}
