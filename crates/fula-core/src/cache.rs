//! Append-only list caches fed by collection subscriptions
//!
//! Entries are keyed by their record key; a later record with the same key
//! replaces the earlier one in place. Nothing is ever removed for the lifetime
//! of the process, so deletions made elsewhere stay visible until restart.

use crate::envelope::RecordEnvelope;
use fula_crypto::RecordKey;
use fula_replica::{CollectionEvent, CollectionFeed};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// In-memory snapshot of a collection
pub struct ListCache<T> {
    name: &'static str,
    entries: RwLock<Vec<(String, T)>>,
}

impl<T: Clone> ListCache<T> {
    /// Empty cache for the named collection
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Collection name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Insert or replace the entry for `key`
    pub fn upsert(&self, key: &str, value: T) {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => entries.push((key.to_string(), value)),
        }
    }

    /// Entry for `key`, if cached
    pub fn get(&self, key: &str) -> Option<T> {
        self.entries
            .read()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Values in first-seen order
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.read().iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Drain `feed` into `cache` until the feed closes or `shutdown` fires.
///
/// `ready` is signalled once the initial snapshot has been replayed. Records
/// that do not open under `key` are skipped.
pub async fn follow<T>(
    mut feed: CollectionFeed,
    cache: Arc<ListCache<T>>,
    key: Arc<RecordKey>,
    ready: oneshot::Sender<()>,
    shutdown: CancellationToken,
) where
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    let mut ready = Some(ready);
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = feed.next() => event,
        };
        match event {
            Some(CollectionEvent::Record(record)) => {
                match RecordEnvelope::open::<T>(&key, &record.value) {
                    Ok(value) => cache.upsert(&record.key, value),
                    Err(e) => debug!(
                        collection = cache.name(),
                        key = %record.key,
                        error = %e,
                        "skipping record that does not open with our key"
                    ),
                }
            }
            Some(CollectionEvent::SnapshotComplete) => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(());
                }
            }
            None => break,
        }
    }
    debug!(collection = cache.name(), "collection follower stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use fula_replica::CollectionRecord;
    use tokio::sync::mpsc;

    #[test]
    fn test_upsert_replaces_in_place() {
        let cache = ListCache::new("C");
        cache.upsert("a", 1);
        cache.upsert("b", 2);
        cache.upsert("a", 3);
        assert_eq!(cache.snapshot(), vec![3, 2]);
        assert_eq!(cache.get("b"), Some(2));
    }

    #[tokio::test]
    async fn test_follow_skips_foreign_records_and_signals_ready() {
        let key = Arc::new(RecordKey::generate());
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(CollectionEvent::Record(CollectionRecord {
            key: "mine".to_string(),
            value: RecordEnvelope::seal(&key, &7u32).unwrap(),
        }))
        .unwrap();
        tx.send(CollectionEvent::Record(CollectionRecord {
            key: "foreign".to_string(),
            value: RecordEnvelope::seal(&RecordKey::generate(), &9u32).unwrap(),
        }))
        .unwrap();
        tx.send(CollectionEvent::Record(CollectionRecord {
            key: "garbage".to_string(),
            value: Bytes::from_static(b"not json"),
        }))
        .unwrap();
        tx.send(CollectionEvent::SnapshotComplete).unwrap();

        let cache = Arc::new(ListCache::<u32>::new("C"));
        let (ready_tx, ready_rx) = oneshot::channel();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(follow(
            CollectionFeed::new(rx),
            Arc::clone(&cache),
            key,
            ready_tx,
            shutdown.clone(),
        ));

        ready_rx.await.unwrap();
        assert_eq!(cache.snapshot(), vec![7]);

        shutdown.cancel();
        task.await.unwrap();
    }
}
