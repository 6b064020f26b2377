//! Encrypted per-user metadata store
//!
//! Every private record is sealed with the user's record key and written into
//! the user's namespace on the replica. Point lookups go straight to the
//! replica as one-shot reads; list operations are served from caches that
//! background tasks keep in sync with the replica's collections.
//!
//! ```text
//!   Uninitialized ──init()──▶ Authenticating ──▶ Ready
//!         ▲                          │
//!         └──────── init() ◀──── Failed
//! ```
//!
//! Only a `Ready` store serves requests; everything else answers
//! [`CoreError::Unauthenticated`].

use crate::{
    cache::{follow, ListCache},
    envelope::{from_plain, to_plain, RecordEnvelope},
    metadata::{BucketMetadata, FileMetadata, SharedFileMetadata, ShareUserMetadata},
    schema, CoreError, Result,
};
use bytes::Bytes;
use fula_crypto::RecordKey;
use fula_replica::{Namespace, Replica, ReplicaError};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Lifecycle of a [`MetadataStore`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Authenticating,
    Ready,
    Failed(String),
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Authenticating => f.write_str("authenticating"),
            Self::Ready => f.write_str("ready"),
            Self::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Store tuning
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Credential for the shared public namespace
    pub public_token: String,
    /// How long `init` waits for every collection snapshot
    pub ready_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            public_token: String::new(),
            ready_timeout: Duration::from_secs(10),
        }
    }
}

impl StoreConfig {
    /// Config with the given public namespace credential
    pub fn new(public_token: impl Into<String>) -> Self {
        Self {
            public_token: public_token.into(),
            ..Default::default()
        }
    }

    /// Set the readiness timeout
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }
}

/// Who the store acts for
pub struct StoreIdentity {
    /// Owner id, the hex public key
    pub owner: String,
    /// Session token for the owner's namespace
    pub token: String,
    /// Key sealing every private record
    pub record_key: RecordKey,
}

/// Encrypted metadata store over a [`Replica`]
pub struct MetadataStore<R: Replica> {
    replica: Arc<R>,
    owner: String,
    namespace: Namespace,
    token: String,
    record_key: Arc<RecordKey>,
    config: StoreConfig,
    state: RwLock<StoreState>,
    buckets: Arc<ListCache<BucketMetadata>>,
    shared_with_me: Arc<ListCache<SharedFileMetadata>>,
    shared_by_me: Arc<ListCache<SharedFileMetadata>>,
    recently_shared_with: Arc<ListCache<ShareUserMetadata>>,
    shutdown: CancellationToken,
}

impl<R: Replica> MetadataStore<R> {
    /// Create an uninitialized store
    pub fn new(replica: Arc<R>, identity: StoreIdentity, config: StoreConfig) -> Self {
        Self {
            replica,
            namespace: Namespace::user(identity.owner.clone()),
            owner: identity.owner,
            token: identity.token,
            record_key: Arc::new(identity.record_key),
            config,
            state: RwLock::new(StoreState::Uninitialized),
            buckets: Arc::new(ListCache::new(schema::BUCKET_COLLECTION)),
            shared_with_me: Arc::new(ListCache::new(schema::SHARED_WITH_ME_COLLECTION)),
            shared_by_me: Arc::new(ListCache::new(schema::SHARED_BY_ME_COLLECTION)),
            recently_shared_with: Arc::new(ListCache::new(
                schema::RECENTLY_SHARED_WITH_COLLECTION,
            )),
            shutdown: CancellationToken::new(),
        }
    }

    /// Owner id
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Current lifecycle state
    pub fn state(&self) -> StoreState {
        self.state.read().clone()
    }

    /// Authenticate both namespaces and wait until every list cache holds its
    /// initial snapshot. Calling it on a ready store is a no-op.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn init(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(CoreError::Unauthenticated(
                "metadata store is closed".to_string(),
            ));
        }
        {
            let mut state = self.state.write();
            match *state {
                StoreState::Ready => return Ok(()),
                StoreState::Authenticating => {
                    return Err(CoreError::Validation(
                        "initialization already in progress".to_string(),
                    ))
                }
                _ => *state = StoreState::Authenticating,
            }
        }

        let attempt = self.shutdown.child_token();
        match self.start(&attempt).await {
            Ok(()) => {
                *self.state.write() = StoreState::Ready;
                info!("metadata store ready");
                Ok(())
            }
            Err(e) => {
                attempt.cancel();
                warn!(error = %e, "metadata store initialization failed");
                *self.state.write() = StoreState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn start(&self, attempt: &CancellationToken) -> Result<()> {
        self.replica
            .authenticate(&self.namespace, &self.token)
            .await?;
        self.replica
            .authenticate(&Namespace::Public, &self.config.public_token)
            .await?;

        let ready = vec![
            self.spawn_follower(&self.buckets, attempt).await?,
            self.spawn_follower(&self.shared_with_me, attempt).await?,
            self.spawn_follower(&self.shared_by_me, attempt).await?,
            self.spawn_follower(&self.recently_shared_with, attempt).await?,
        ];

        match tokio::time::timeout(
            self.config.ready_timeout,
            futures::future::try_join_all(ready),
        )
        .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(CoreError::RemoteOperationFailure(ReplicaError::Closed(
                "collection feed closed before its snapshot completed".to_string(),
            ))),
            Err(_) => Err(CoreError::Timeout(format!(
                "collection snapshots not complete after {:?}",
                self.config.ready_timeout
            ))),
        }
    }

    async fn spawn_follower<T>(
        &self,
        cache: &Arc<ListCache<T>>,
        attempt: &CancellationToken,
    ) -> Result<oneshot::Receiver<()>>
    where
        T: Clone + DeserializeOwned + Send + Sync + 'static,
    {
        let feed = self.replica.subscribe(&self.namespace, cache.name()).await?;
        let (tx, rx) = oneshot::channel();
        tokio::spawn(follow(
            feed,
            Arc::clone(cache),
            Arc::clone(&self.record_key),
            tx,
            attempt.clone(),
        ));
        Ok(rx)
    }

    /// Stop the background followers. A closed store cannot be reopened.
    pub fn close(&self) {
        self.shutdown.cancel();
        *self.state.write() = StoreState::Uninitialized;
    }

    fn ensure_ready(&self) -> Result<()> {
        match &*self.state.read() {
            StoreState::Ready => Ok(()),
            other => Err(CoreError::Unauthenticated(format!(
                "metadata store is {}",
                other
            ))),
        }
    }

    async fn get_private<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.replica.get_once(&self.namespace, key).await? {
            Some(raw) => Ok(Some(RecordEnvelope::open(&self.record_key, &raw)?)),
            None => Ok(None),
        }
    }

    async fn put_private<T: Serialize>(&self, key: &str, value: &T) -> Result<Bytes> {
        let sealed = RecordEnvelope::seal(&self.record_key, value)?;
        self.replica
            .put(&self.namespace, key, sealed.clone())
            .await?;
        Ok(sealed)
    }

    async fn append_private(&self, collection: &str, key: &str, sealed: Bytes) -> Result<()> {
        self.replica
            .append(&self.namespace, collection, key, sealed)
            .await?;
        Ok(())
    }

    // ---- buckets ----

    /// Create a bucket record with a fresh 80-byte encryption key
    #[instrument(skip(self, bucket_key))]
    pub async fn create_bucket(
        &self,
        slug: &str,
        db_id: &str,
        bucket_key: &str,
    ) -> Result<BucketMetadata> {
        self.ensure_ready()?;
        validate_slug(slug)?;
        if db_id.is_empty() {
            return Err(CoreError::Validation("db id cannot be empty".to_string()));
        }
        if self.find_bucket(slug).await?.is_some() {
            return Err(CoreError::AlreadyExists(slug.to_string()));
        }

        let bucket = BucketMetadata {
            slug: slug.to_string(),
            db_id: db_id.to_string(),
            bucket_key: bucket_key.to_string(),
            encryption_key: RecordKey::generate(),
        };
        let key = schema::bucket_key(slug, &self.owner);
        let sealed = self.put_private(&key, &bucket).await?;
        self.append_private(schema::BUCKET_COLLECTION, slug, sealed)
            .await?;
        self.buckets.upsert(slug, bucket.clone());

        debug!(slug, db_id, "bucket created");
        Ok(bucket)
    }

    /// One-shot read of a bucket record
    #[instrument(skip(self))]
    pub async fn find_bucket(&self, slug: &str) -> Result<Option<BucketMetadata>> {
        self.ensure_ready()?;
        self.get_private(&schema::bucket_key(slug, &self.owner))
            .await
    }

    /// Every bucket seen so far
    pub fn list_buckets(&self) -> Result<Vec<BucketMetadata>> {
        self.ensure_ready()?;
        Ok(self.buckets.snapshot())
    }

    // ---- files ----

    /// Merge `metadata` onto the stored record and write it back under its
    /// path key and, if it has one, its uuid key. A stored uuid is kept even
    /// when the update carries a different one.
    #[instrument(skip(self, metadata), fields(bucket = %metadata.bucket_slug, path = %metadata.path))]
    pub async fn upsert_file_metadata(&self, metadata: FileMetadata) -> Result<FileMetadata> {
        self.ensure_ready()?;
        validate_file(&metadata)?;

        let key = schema::file_metadata_key(&metadata.bucket_slug, &metadata.db_id, &metadata.path);
        let merged = match self.get_private::<FileMetadata>(&key).await? {
            Some(existing) => existing.merge(metadata),
            None => metadata,
        };

        let sealed = RecordEnvelope::seal(&self.record_key, &merged)?;
        self.replica
            .put(&self.namespace, &key, sealed.clone())
            .await?;
        if let Some(uuid) = &merged.uuid {
            self.replica
                .put(&self.namespace, &schema::uuid_key(uuid), sealed)
                .await?;
        }
        Ok(merged)
    }

    /// Look up a file by bucket and path
    #[instrument(skip(self))]
    pub async fn find_file_metadata(
        &self,
        bucket_slug: &str,
        db_id: &str,
        path: &str,
    ) -> Result<Option<FileMetadata>> {
        self.ensure_ready()?;
        self.get_private(&schema::file_metadata_key(bucket_slug, db_id, path))
            .await
    }

    /// Look up a file by uuid: our private index first, then the public one
    #[instrument(skip(self))]
    pub async fn find_file_metadata_by_uuid(&self, uuid: &str) -> Result<Option<FileMetadata>> {
        self.ensure_ready()?;
        let key = schema::uuid_key(uuid);
        if let Some(found) = self.get_private(&key).await? {
            return Ok(Some(found));
        }
        match self.replica.get_once(&Namespace::Public, &key).await? {
            Some(raw) => Ok(Some(from_plain(&raw)?)),
            None => Ok(None),
        }
    }

    /// Publish a file's metadata in plaintext to the public uuid index
    #[instrument(skip(self, metadata), fields(path = %metadata.path))]
    pub async fn set_file_public(&self, metadata: &FileMetadata) -> Result<()> {
        self.ensure_ready()?;
        let uuid = metadata
            .uuid
            .as_deref()
            .ok_or_else(|| CoreError::MissingUuid(metadata.path.clone()))?;
        self.replica
            .put(&Namespace::Public, &schema::uuid_key(uuid), to_plain(metadata)?)
            .await?;
        info!(uuid, "file published");
        Ok(())
    }

    // ---- sharing ----

    /// Record a file shared with us. Files carrying an invitation id are also
    /// indexed under that invitation.
    #[instrument(skip(self, shared), fields(path = %shared.file.path))]
    pub async fn upsert_shared_with_me_file(
        &self,
        mut shared: SharedFileMetadata,
    ) -> Result<SharedFileMetadata> {
        self.ensure_ready()?;
        validate_file(&shared.file)?;

        let key = schema::shared_with_me_key(
            &shared.file.bucket_slug,
            &shared.file.db_id,
            &shared.file.path,
        );
        if let Some(existing) = self.get_private::<SharedFileMetadata>(&key).await? {
            shared.file = existing.file.merge(shared.file);
            shared.invitation_id = shared.invitation_id.or(existing.invitation_id);
            shared.bucket_key = shared.bucket_key.or(existing.bucket_key);
        }
        let sealed = self.put_private(&key, &shared).await?;
        self.append_private(schema::SHARED_WITH_ME_COLLECTION, &key, sealed)
            .await?;
        self.shared_with_me.upsert(&key, shared.clone());

        if let Some(invitation_id) = &shared.invitation_id {
            let index_key = schema::invitation_key(invitation_id);
            let mut files: Vec<SharedFileMetadata> =
                self.get_private(&index_key).await?.unwrap_or_default();
            files.retain(|f| !same_file(&f.file, &shared.file));
            files.push(shared.clone());
            self.put_private(&index_key, &files).await?;
        }
        Ok(shared)
    }

    /// Files shared with us
    pub fn list_shared_with_me_files(&self) -> Result<Vec<SharedFileMetadata>> {
        self.ensure_ready()?;
        Ok(self.shared_with_me.snapshot())
    }

    /// Files that arrived with `invitation_id`
    #[instrument(skip(self))]
    pub async fn find_shared_files_by_invitation(
        &self,
        invitation_id: &str,
    ) -> Result<Vec<SharedFileMetadata>> {
        self.ensure_ready()?;
        Ok(self
            .get_private(&schema::invitation_key(invitation_id))
            .await?
            .unwrap_or_default())
    }

    /// Record a file we shared
    #[instrument(skip(self, shared), fields(path = %shared.file.path))]
    pub async fn upsert_shared_by_me_file(
        &self,
        shared: SharedFileMetadata,
    ) -> Result<SharedFileMetadata> {
        self.ensure_ready()?;
        validate_file(&shared.file)?;

        let key = schema::shared_by_me_key(
            &shared.file.bucket_slug,
            &shared.file.db_id,
            &shared.file.path,
        );
        let sealed = self.put_private(&key, &shared).await?;
        self.append_private(schema::SHARED_BY_ME_COLLECTION, &key, sealed)
            .await?;
        self.shared_by_me.upsert(&key, shared.clone());
        Ok(shared)
    }

    /// Files we shared
    pub fn list_shared_by_me_files(&self) -> Result<Vec<SharedFileMetadata>> {
        self.ensure_ready()?;
        Ok(self.shared_by_me.snapshot())
    }

    /// Upsert a recently-shared-with entry, keyed by public key
    #[instrument(skip(self, user), fields(public_key = %user.public_key))]
    pub async fn add_user_recently_shared_with(
        &self,
        user: ShareUserMetadata,
    ) -> Result<ShareUserMetadata> {
        self.ensure_ready()?;
        if user.public_key.is_empty() {
            return Err(CoreError::Validation("public key cannot be empty".to_string()));
        }
        let key = schema::recently_shared_with_key(&user.public_key);
        let sealed = self.put_private(&key, &user).await?;
        self.append_private(
            schema::RECENTLY_SHARED_WITH_COLLECTION,
            &user.public_key,
            sealed,
        )
        .await?;
        self.recently_shared_with.upsert(&user.public_key, user.clone());
        Ok(user)
    }

    /// Users we recently shared with
    pub fn list_users_recently_shared_with(&self) -> Result<Vec<ShareUserMetadata>> {
        self.ensure_ready()?;
        Ok(self.recently_shared_with.snapshot())
    }

    // ---- notifications ----

    /// Store the notifications watermark, in milliseconds since the epoch
    #[instrument(skip(self))]
    pub async fn set_notifications_last_seen_at(&self, timestamp_ms: i64) -> Result<()> {
        self.ensure_ready()?;
        self.put_private(schema::NOTIFICATIONS_LAST_SEEN_AT, &timestamp_ms)
            .await?;
        Ok(())
    }

    /// The notifications watermark, 0 if never set
    #[instrument(skip(self))]
    pub async fn get_notifications_last_seen_at(&self) -> Result<i64> {
        self.ensure_ready()?;
        Ok(self
            .get_private(schema::NOTIFICATIONS_LAST_SEEN_AT)
            .await?
            .unwrap_or(0))
    }
}

impl<R: Replica> Drop for MetadataStore<R> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn validate_slug(slug: &str) -> Result<()> {
    if slug.trim().is_empty() {
        return Err(CoreError::Validation("bucket slug cannot be empty".to_string()));
    }
    if slug.contains('/') {
        return Err(CoreError::Validation(format!(
            "bucket slug cannot contain '/': {}",
            slug
        )));
    }
    Ok(())
}

fn validate_file(metadata: &FileMetadata) -> Result<()> {
    validate_slug(&metadata.bucket_slug)?;
    if metadata.path.trim().is_empty() {
        return Err(CoreError::Validation("file path cannot be empty".to_string()));
    }
    Ok(())
}

fn same_file(a: &FileMetadata, b: &FileMetadata) -> bool {
    a.bucket_slug == b.bucket_slug && a.db_id == b.db_id && a.path == b.path
}

#[cfg(test)]
mod tests {
    use super::*;
    use fula_crypto::KekKeyPair;
    use fula_replica::MemoryReplica;

    const PUBLIC_TOKEN: &str = "public-token";

    fn store_for(replica: &MemoryReplica) -> MetadataStore<MemoryReplica> {
        let identity = KekKeyPair::generate();
        MetadataStore::new(
            Arc::new(replica.connect()),
            StoreIdentity {
                owner: identity.public_key().to_hex(),
                token: "session".to_string(),
                record_key: fula_crypto::derive_record_key(identity.secret_key()).unwrap(),
            },
            StoreConfig::new(PUBLIC_TOKEN).with_ready_timeout(Duration::from_secs(2)),
        )
    }

    async fn ready_store() -> MetadataStore<MemoryReplica> {
        let store = store_for(&MemoryReplica::new(PUBLIC_TOKEN));
        store.init().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_operations_require_ready_state() {
        let store = store_for(&MemoryReplica::new(PUBLIC_TOKEN));
        assert_eq!(store.state(), StoreState::Uninitialized);
        let result = store.find_bucket("docs").await;
        assert!(matches!(result, Err(CoreError::Unauthenticated(_))));
        assert!(store.list_buckets().is_err());
    }

    #[tokio::test]
    async fn test_bad_public_token_fails_init() {
        let replica = MemoryReplica::new("something-else");
        let store = store_for(&replica);
        let result = store.init().await;
        assert!(matches!(result, Err(CoreError::Unauthenticated(_))));
        assert!(matches!(store.state(), StoreState::Failed(_)));
    }

    #[tokio::test]
    async fn test_create_and_find_bucket() {
        let store = ready_store().await;
        let created = store.create_bucket("docs", "db1", "root1").await.unwrap();
        let found = store.find_bucket("docs").await.unwrap().unwrap();
        assert_eq!(found.db_id, created.db_id);
        assert_eq!(found.encryption_key, created.encryption_key);
        assert_eq!(store.list_buckets().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_bucket_rejected() {
        let store = ready_store().await;
        store.create_bucket("docs", "db1", "root1").await.unwrap();
        let result = store.create_bucket("docs", "db2", "root2").await;
        assert!(matches!(result, Err(CoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_invalid_slug_rejected() {
        let store = ready_store().await;
        assert!(store
            .create_bucket("", "db1", "root")
            .await
            .unwrap_err()
            .is_validation());
        assert!(store
            .create_bucket("a/b", "db1", "root")
            .await
            .unwrap_err()
            .is_validation());
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_and_merges() {
        let store = ready_store().await;
        let first = FileMetadata::new("docs", "db1", "/a.txt")
            .with_uuid("u1")
            .with_mime_type("text/plain");
        let stored = store.upsert_file_metadata(first.clone()).await.unwrap();
        let again = store.upsert_file_metadata(first).await.unwrap();
        assert_eq!(stored, again);

        let partial = FileMetadata::new("docs", "db1", "/a.txt").with_encryption_key("ek");
        let merged = store.upsert_file_metadata(partial).await.unwrap();
        assert_eq!(merged.uuid.as_deref(), Some("u1"));
        assert_eq!(merged.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(merged.encryption_key.as_deref(), Some("ek"));

        let by_uuid = store.find_file_metadata_by_uuid("u1").await.unwrap();
        assert_eq!(by_uuid, Some(merged));
    }

    #[tokio::test]
    async fn test_set_file_public_requires_uuid() {
        let store = ready_store().await;
        let result = store
            .set_file_public(&FileMetadata::new("docs", "db1", "/a.txt"))
            .await;
        assert!(matches!(result, Err(CoreError::MissingUuid(_))));
    }

    #[tokio::test]
    async fn test_uuid_lookup_for_other_identity_after_publish() {
        let replica = MemoryReplica::new(PUBLIC_TOKEN);
        let alice = store_for(&replica);
        let bob = store_for(&replica);
        alice.init().await.unwrap();
        bob.init().await.unwrap();

        let file = alice
            .upsert_file_metadata(FileMetadata::new("docs", "db1", "/a.txt").with_uuid("u9"))
            .await
            .unwrap();
        assert_eq!(bob.find_file_metadata_by_uuid("u9").await.unwrap(), None);

        alice.set_file_public(&file).await.unwrap();
        assert_eq!(
            bob.find_file_metadata_by_uuid("u9").await.unwrap(),
            Some(file)
        );
    }

    #[tokio::test]
    async fn test_point_lookup_with_wrong_key_propagates() {
        let replica = MemoryReplica::new(PUBLIC_TOKEN);
        let store = store_for(&replica);
        store.init().await.unwrap();

        let ns = Namespace::user(store.owner().to_string());
        let foreign = RecordEnvelope::seal(&RecordKey::generate(), &"x").unwrap();
        replica.authenticate(&ns, "session").await.unwrap();
        replica
            .put(&ns, &schema::bucket_key("docs", store.owner()), foreign)
            .await
            .unwrap();

        let result = store.find_bucket("docs").await;
        assert!(matches!(result, Err(CoreError::DecryptionFailure(_))));
    }

    #[tokio::test]
    async fn test_list_skips_foreign_records() {
        let replica = MemoryReplica::new(PUBLIC_TOKEN);
        let store = store_for(&replica);
        let ns = Namespace::user(store.owner().to_string());
        replica.authenticate(&ns, "session").await.unwrap();
        replica
            .append(
                &ns,
                schema::BUCKET_COLLECTION,
                "foreign",
                RecordEnvelope::seal(&RecordKey::generate(), &"x").unwrap(),
            )
            .await
            .unwrap();

        store.init().await.unwrap();
        assert!(store.list_buckets().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existing_records_loaded_on_init() {
        let replica = MemoryReplica::new(PUBLIC_TOKEN);
        let identity = KekKeyPair::generate();
        let make = || {
            MetadataStore::new(
                Arc::new(replica.connect()),
                StoreIdentity {
                    owner: identity.public_key().to_hex(),
                    token: "session".to_string(),
                    record_key: fula_crypto::derive_record_key(identity.secret_key()).unwrap(),
                },
                StoreConfig::new(PUBLIC_TOKEN),
            )
        };

        let first = make();
        first.init().await.unwrap();
        first.create_bucket("docs", "db1", "root").await.unwrap();
        first.close();

        let second = make();
        second.init().await.unwrap();
        let slugs: Vec<_> = second
            .list_buckets()
            .unwrap()
            .into_iter()
            .map(|b| b.slug)
            .collect();
        assert_eq!(slugs, vec!["docs".to_string()]);
    }

    #[tokio::test]
    async fn test_shared_with_me_indexed_by_invitation() {
        let store = ready_store().await;
        let shared = SharedFileMetadata {
            file: FileMetadata::new("docs", "db1", "/a.txt"),
            shared_by: "bob".to_string(),
            invitation_id: Some("inv-1".to_string()),
            bucket_key: None,
        };
        store.upsert_shared_with_me_file(shared.clone()).await.unwrap();
        store.upsert_shared_with_me_file(shared.clone()).await.unwrap();

        assert_eq!(store.list_shared_with_me_files().unwrap(), vec![shared.clone()]);
        assert_eq!(
            store.find_shared_files_by_invitation("inv-1").await.unwrap(),
            vec![shared]
        );
        assert!(store
            .find_shared_files_by_invitation("other")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_recently_shared_with_upserts_by_key() {
        let store = ready_store().await;
        store
            .add_user_recently_shared_with(ShareUserMetadata::new("pk1"))
            .await
            .unwrap();
        let mut labelled = ShareUserMetadata::new("pk1");
        labelled.label = Some("Bob".to_string());
        store.add_user_recently_shared_with(labelled).await.unwrap();

        let users = store.list_users_recently_shared_with().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].label.as_deref(), Some("Bob"));
    }

    #[tokio::test]
    async fn test_notifications_watermark_defaults_to_zero() {
        let store = ready_store().await;
        assert_eq!(store.get_notifications_last_seen_at().await.unwrap(), 0);
        store
            .set_notifications_last_seen_at(1_700_000_000_000)
            .await
            .unwrap();
        assert_eq!(
            store.get_notifications_last_seen_at().await.unwrap(),
            1_700_000_000_000
        );
    }

    #[tokio::test]
    async fn test_closed_store_rejects_requests() {
        let store = ready_store().await;
        store.close();
        assert!(matches!(
            store.find_bucket("docs").await,
            Err(CoreError::Unauthenticated(_))
        ));
    }
}
