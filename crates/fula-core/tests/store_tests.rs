//! Metadata store behaviour across connections and identities

use fula_core::{
    schema, CoreError, FileMetadata, MetadataStore, SharedFileMetadata, StoreConfig,
    StoreIdentity, StoreState,
};
use fula_crypto::{derive_record_key, KekKeyPair};
use fula_replica::{MemoryReplica, Namespace, Replica};
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

const PUBLIC_TOKEN: &str = "fula-public";

fn open_store(replica: &MemoryReplica, identity: &KekKeyPair) -> MetadataStore<MemoryReplica> {
    MetadataStore::new(
        Arc::new(replica.connect()),
        StoreIdentity {
            owner: identity.public_key().to_hex(),
            token: "session-token".to_string(),
            record_key: derive_record_key(identity.secret_key()).unwrap(),
        },
        StoreConfig::new(PUBLIC_TOKEN).with_ready_timeout(Duration::from_secs(2)),
    )
}

#[test_log::test(tokio::test)]
async fn test_two_devices_of_one_identity_see_the_same_records() {
    let replica = MemoryReplica::new(PUBLIC_TOKEN);
    let identity = KekKeyPair::generate();

    let laptop = open_store(&replica, &identity);
    laptop.init().await.unwrap();
    let phone = open_store(&replica, &identity);
    phone.init().await.unwrap();

    let bucket = laptop.create_bucket("photos", "db-7", "root-7").await.unwrap();
    let seen = phone.find_bucket("photos").await.unwrap().unwrap();
    assert_eq!(seen.encryption_key, bucket.encryption_key);

    let dup = phone.create_bucket("photos", "db-8", "root-8").await;
    assert!(matches!(dup, Err(CoreError::AlreadyExists(_))));
}

#[test_log::test(tokio::test)]
async fn test_live_appends_reach_other_devices_caches() {
    let replica = MemoryReplica::new(PUBLIC_TOKEN);
    let identity = KekKeyPair::generate();

    let laptop = open_store(&replica, &identity);
    laptop.init().await.unwrap();
    let phone = open_store(&replica, &identity);
    phone.init().await.unwrap();

    laptop.create_bucket("music", "db-1", "root-1").await.unwrap();

    let mut buckets = Vec::new();
    for _ in 0..50 {
        buckets = phone.list_buckets().unwrap();
        if !buckets.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].slug, "music");
}

#[test_log::test(tokio::test)]
async fn test_another_identity_cannot_read_private_records() {
    let replica = MemoryReplica::new(PUBLIC_TOKEN);
    let alice = KekKeyPair::generate();
    let store = open_store(&replica, &alice);
    store.init().await.unwrap();
    store
        .upsert_file_metadata(FileMetadata::new("docs", "db1", "/a.txt").with_uuid("u-1"))
        .await
        .unwrap();

    // a stolen session token does not help without the record key
    let mallory = MetadataStore::new(
        Arc::new(replica.connect()),
        StoreIdentity {
            owner: alice.public_key().to_hex(),
            token: "session-token".to_string(),
            record_key: derive_record_key(KekKeyPair::generate().secret_key()).unwrap(),
        },
        StoreConfig::new(PUBLIC_TOKEN),
    );
    mallory.init().await.unwrap();
    let result = mallory.find_file_metadata("docs", "db1", "/a.txt").await;
    assert!(matches!(result, Err(CoreError::DecryptionFailure(_))));
}

#[rstest]
#[case("")]
#[case("   ")]
#[tokio::test]
async fn test_empty_paths_are_rejected_before_io(#[case] path: &str) {
    let replica = MemoryReplica::new(PUBLIC_TOKEN);
    let store = open_store(&replica, &KekKeyPair::generate());
    store.init().await.unwrap();
    replica.set_offline(true);

    let result = store
        .upsert_shared_by_me_file(SharedFileMetadata {
            file: FileMetadata::new("docs", "db1", path),
            shared_by: "me".to_string(),
            invitation_id: None,
            bucket_key: None,
        })
        .await;
    assert!(result.unwrap_err().is_validation());
}

#[tokio::test]
async fn test_offline_replica_fails_initialization() {
    let replica = MemoryReplica::new(PUBLIC_TOKEN);
    replica.set_offline(true);
    let store = open_store(&replica, &KekKeyPair::generate());

    let result = store.init().await;
    assert!(matches!(result, Err(CoreError::RemoteOperationFailure(_))));
    assert!(matches!(store.state(), StoreState::Failed(_)));

    replica.set_offline(false);
    store.init().await.unwrap();
    assert_eq!(store.state(), StoreState::Ready);
}

#[tokio::test]
async fn test_watermark_is_sealed_on_the_replica() {
    let replica = MemoryReplica::new(PUBLIC_TOKEN);
    let identity = KekKeyPair::generate();
    let store = open_store(&replica, &identity);
    store.init().await.unwrap();
    store.set_notifications_last_seen_at(42).await.unwrap();

    let ns = Namespace::user(identity.public_key().to_hex());
    replica.authenticate(&ns, "any").await.unwrap();
    let raw = replica
        .get_once(&ns, schema::NOTIFICATIONS_LAST_SEEN_AT)
        .await
        .unwrap()
        .unwrap();
    let envelope: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert!(envelope["data"].is_string());
    assert_ne!(raw.as_ref(), b"42");
}

#[test_log::test(tokio::test)]
async fn test_uuid_index_keeps_the_first_uuid() {
    let replica = MemoryReplica::new(PUBLIC_TOKEN);
    let store = open_store(&replica, &KekKeyPair::generate());
    store.init().await.unwrap();

    store
        .upsert_file_metadata(FileMetadata::new("docs", "db1", "/a.txt").with_uuid("old"))
        .await
        .unwrap();
    let merged = store
        .upsert_file_metadata(FileMetadata::new("docs", "db1", "/a.txt").with_uuid("new"))
        .await
        .unwrap();

    assert_eq!(merged.uuid.as_deref(), Some("old"));
    assert_eq!(store.find_file_metadata_by_uuid("new").await.unwrap(), None);
    let by_uuid = store.find_file_metadata_by_uuid("old").await.unwrap().unwrap();
    assert_eq!(by_uuid.path, "/a.txt");
}
