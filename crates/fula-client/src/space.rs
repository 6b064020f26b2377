//! The client facade
//!
//! A [`FulaSpace`] is one signed-in user's view of their buckets, files,
//! shares and inbox.

use crate::{
    config::ClientConfig,
    mailbox::Mailbox,
    notifications::{self, MessageBody, Notification, NotificationType},
    object_store::{ByteStream, ObjectStore},
    session::Session,
    sharing::{
        self, FullPath, Invitation, InvitationStatus, LocalTempKeyIssuer, ShareOutcome,
        ShareRecipient, TempKeyIssuer,
    },
    types::{AccessRole, UploadItem},
    upload::{UploadHandle, UploadPipeline},
    ClientError, Result,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use fula_core::{
    BucketMetadata, FileMetadata, MetadataStore, SharedFileMetadata, ShareUserMetadata,
};
use fula_crypto::{PublicKey, RecordKey};
use fula_replica::Replica;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// A signed-in user's space
pub struct FulaSpace<R: Replica, O: ObjectStore, M: Mailbox> {
    session: Session,
    store: Arc<MetadataStore<R>>,
    objects: Arc<O>,
    mailbox: M,
    temp_keys: Arc<dyn TempKeyIssuer>,
    config: ClientConfig,
    shutdown: CancellationToken,
}

impl<R, O, M> FulaSpace<R, O, M>
where
    R: Replica + 'static,
    O: ObjectStore + 'static,
    M: Mailbox,
{
    /// Open the metadata store for `session` and wait until it is ready
    #[instrument(skip_all, fields(owner = %session.owner_id()))]
    pub async fn open(
        session: Session,
        replica: Arc<R>,
        objects: Arc<O>,
        mailbox: M,
        config: ClientConfig,
    ) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(MetadataStore::new(
            replica,
            session.store_identity(),
            config.store_config(),
        ));
        store.init().await?;
        info!("space opened");
        Ok(Self {
            session,
            store,
            objects,
            mailbox,
            temp_keys: Arc::new(LocalTempKeyIssuer),
            config,
            shutdown: CancellationToken::new(),
        })
    }

    /// Use `issuer` for recipients without a key
    pub fn with_temp_key_issuer(mut self, issuer: Arc<dyn TempKeyIssuer>) -> Self {
        self.temp_keys = issuer;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &MetadataStore<R> {
        &self.store
    }

    /// Cancel running uploads and stop the store's followers
    pub fn close(&self) {
        self.shutdown.cancel();
        self.store.close();
    }

    // ---- buckets ----

    /// Create a bucket at the object store and register it
    #[instrument(skip(self))]
    pub async fn create_bucket(&self, slug: &str) -> Result<BucketMetadata> {
        if slug.is_empty() || slug.contains('/') {
            return Err(ClientError::Validation(format!("invalid bucket slug {:?}", slug)));
        }
        let root = self.objects.get_or_create(slug).await?;
        Ok(self.store.create_bucket(slug, &root.db_id, &root.key).await?)
    }

    pub fn list_buckets(&self) -> Result<Vec<BucketMetadata>> {
        Ok(self.store.list_buckets()?)
    }

    async fn bucket(&self, slug: &str) -> Result<BucketMetadata> {
        self.store
            .find_bucket(slug)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("bucket {}", slug)))
    }

    // ---- files ----

    /// Start a batch upload into `bucket`
    #[instrument(skip(self, items), fields(files = items.len()))]
    pub async fn add_items(&self, bucket: &str, items: Vec<UploadItem>) -> Result<UploadHandle> {
        if items.is_empty() {
            return Err(ClientError::Validation("no items to upload".to_string()));
        }
        let bucket = self.bucket(bucket).await?;
        let pipeline = UploadPipeline::new(
            Arc::clone(&self.store),
            Arc::clone(&self.objects),
            bucket,
            self.config.upload_concurrency,
        );
        Ok(pipeline.start(items, self.shutdown.child_token()))
    }

    /// Read and decrypt one of our files
    #[instrument(skip(self))]
    pub async fn open_file(&self, bucket: &str, path: &str) -> Result<Bytes> {
        let bucket = self.bucket(bucket).await?;
        let sealed = read_all(self.objects.pull_path(&bucket.bucket_key, path).await?).await?;
        Ok(Bytes::from(bucket.encryption_key.decrypt(&sealed)?))
    }

    /// Read and decrypt a file someone shared with us
    #[instrument(skip(self, shared), fields(path = %shared.file.path))]
    pub async fn open_shared_file(&self, shared: &SharedFileMetadata) -> Result<Bytes> {
        let root_key = shared
            .bucket_key
            .as_deref()
            .ok_or_else(|| ClientError::Validation("shared file has no bucket root".to_string()))?;
        let key = shared
            .file
            .encryption_key
            .as_deref()
            .ok_or_else(|| ClientError::Validation("shared file has no key".to_string()))?;
        let key = RecordKey::from_hex(key)?;
        let sealed = read_all(self.objects.pull_path(root_key, &shared.file.path).await?).await?;
        Ok(Bytes::from(key.decrypt(&sealed)?))
    }

    /// Publish a file's metadata so anyone can resolve its uuid
    #[instrument(skip(self))]
    pub async fn set_file_public(&self, bucket: &str, path: &str) -> Result<FileMetadata> {
        let bucket = self.bucket(bucket).await?;
        let metadata = self
            .store
            .find_file_metadata(&bucket.slug, &bucket.db_id, path)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("file {}", path)))?;
        self.store.set_file_public(&metadata).await?;
        Ok(metadata)
    }

    /// Resolve a file by uuid, ours or published
    pub async fn file_by_uuid(&self, uuid: &str) -> Result<FileMetadata> {
        self.store
            .find_file_metadata_by_uuid(uuid)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("file {}", uuid)))
    }

    /// Who can access a file at the object store
    pub async fn file_access_roles(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<HashMap<String, AccessRole>> {
        let bucket = self.bucket(bucket).await?;
        self.objects
            .pull_path_access_roles(&bucket.bucket_key, path)
            .await
    }

    // ---- sharing ----

    /// Invite every recipient to `paths`. Temp recipients get a fresh key
    /// from the issuer and are invited under it.
    #[instrument(skip_all, fields(paths = paths.len(), recipients = recipients.len()))]
    pub async fn share_files(
        &self,
        paths: &[FullPath],
        recipients: &[ShareRecipient],
    ) -> Result<ShareOutcome> {
        if recipients.is_empty() {
            return Err(ClientError::Validation("no recipients".to_string()));
        }
        sharing::validate_paths(paths)?;

        let mut outcome = ShareOutcome::default();
        let mut invitees: Vec<(PublicKey, Option<String>)> = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            match recipient {
                ShareRecipient::Existing(key) => invitees.push((*key, None)),
                ShareRecipient::Temp(label) => {
                    let temp = self.temp_keys.issue(label).await?;
                    invitees.push((temp.public_key, Some(temp.label.clone())));
                    outcome.temp_keys.push(temp);
                }
            }
        }

        let keys: Vec<String> = invitees.iter().map(|(key, _)| key.to_hex()).collect();
        let invitations = sharing::create_file_invitations(
            self.session.public_key(),
            paths,
            &keys,
            &self.store,
        )
        .await?;

        for ((invitee, label), invitation) in invitees.iter().zip(&invitations) {
            let body = MessageBody::invitation(NotificationType::Invitation, invitation)?;
            self.mailbox
                .send_message(invitee, body.seal(invitee)?)
                .await?;

            for path in &invitation.item_paths {
                let db_id = path.db_id.clone().unwrap_or_default();
                let mut file = FileMetadata::new(&path.bucket, db_id, &path.path);
                file.uuid = path.uuid.clone();
                self.store
                    .upsert_shared_by_me_file(SharedFileMetadata {
                        file,
                        shared_by: self.session.owner_id(),
                        invitation_id: Some(invitation.invitation_id.clone()),
                        bucket_key: path.bucket_key.clone(),
                    })
                    .await?;
            }

            let mut user = ShareUserMetadata::new(invitee.to_hex());
            user.label = label.clone();
            self.store.add_user_recently_shared_with(user).await?;
            debug!(invitee = %invitee, id = %invitation.invitation_id, "invitation sent");
        }

        outcome.invitations = invitations;
        Ok(outcome)
    }

    /// Record every path of the invitation as shared with us and tell the inviter
    #[instrument(skip_all, fields(id = %notification.id))]
    pub async fn accept_invitation(
        &self,
        notification: &Notification,
    ) -> Result<Vec<SharedFileMetadata>> {
        let (invitation, inviter) = self.pending_invitation(notification)?;
        let mut files = Vec::with_capacity(invitation.item_paths.len());
        for path in &invitation.item_paths {
            let db_id = path.db_id.as_deref().ok_or_else(|| {
                ClientError::Validation(format!("shared path {} has no db id", path.path))
            })?;
            let key = invitation.key_for(path).ok_or_else(|| {
                ClientError::Validation(format!("no key for shared path {}", path.path))
            })?;
            let mut file = FileMetadata::new(&path.bucket, db_id, &path.path).with_encryption_key(key);
            file.uuid = path.uuid.clone();
            let shared = self
                .store
                .upsert_shared_with_me_file(SharedFileMetadata {
                    file,
                    shared_by: invitation.inviter_public_key.clone(),
                    invitation_id: Some(invitation.invitation_id.clone()),
                    bucket_key: path.bucket_key.clone(),
                })
                .await?;
            files.push(shared);
        }
        self.reply(invitation, &inviter, InvitationStatus::Accepted)
            .await?;
        info!(files = files.len(), "invitation accepted");
        Ok(files)
    }

    /// Decline an invitation; nothing is recorded
    #[instrument(skip_all, fields(id = %notification.id))]
    pub async fn reject_invitation(&self, notification: &Notification) -> Result<()> {
        let (invitation, inviter) = self.pending_invitation(notification)?;
        self.reply(invitation, &inviter, InvitationStatus::Rejected)
            .await
    }

    fn pending_invitation<'a>(
        &self,
        notification: &'a Notification,
    ) -> Result<(&'a Invitation, PublicKey)> {
        if notification.kind != NotificationType::Invitation {
            return Err(ClientError::Validation(format!(
                "notification {} is not an invitation",
                notification.id
            )));
        }
        let invitation = notification.related_object.as_ref().ok_or_else(|| {
            ClientError::Validation(format!("notification {} has no invitation", notification.id))
        })?;
        if invitation.invitee_public_key != self.session.owner_id() {
            return Err(ClientError::Validation(
                "invitation is addressed to someone else".to_string(),
            ));
        }
        let inviter = PublicKey::parse(&invitation.inviter_public_key)
            .map_err(|e| ClientError::Validation(format!("invalid inviter key: {}", e)))?;
        Ok((invitation, inviter))
    }

    async fn reply(
        &self,
        invitation: &Invitation,
        inviter: &PublicKey,
        status: InvitationStatus,
    ) -> Result<()> {
        let body = MessageBody::invitation(
            NotificationType::InvitationReply,
            &invitation.with_status(status),
        )?;
        self.mailbox
            .send_message(inviter, body.seal(inviter)?)
            .await?;
        Ok(())
    }

    pub fn shared_with_me(&self) -> Result<Vec<SharedFileMetadata>> {
        Ok(self.store.list_shared_with_me_files()?)
    }

    pub fn shared_by_me(&self) -> Result<Vec<SharedFileMetadata>> {
        Ok(self.store.list_shared_by_me_files()?)
    }

    pub fn recently_shared_with(&self) -> Result<Vec<ShareUserMetadata>> {
        Ok(self.store.list_users_recently_shared_with()?)
    }

    // ---- notifications ----

    /// A page of opened inbox messages, oldest first. Messages we cannot open are skipped.
    #[instrument(skip(self))]
    pub async fn notifications(
        &self,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Notification>> {
        let limit = limit.unwrap_or(self.config.mailbox_page_size);
        let messages = self.mailbox.list_inbox_messages(cursor, limit).await?;
        let last_seen = self.store.get_notifications_last_seen_at().await?;
        Ok(notifications::open_all(
            self.session.identity(),
            &messages,
            last_seen,
        ))
    }

    /// Move the read watermark to `at`
    pub async fn mark_notifications_seen(&self, at: DateTime<Utc>) -> Result<()> {
        Ok(self
            .store
            .set_notifications_last_seen_at(at.timestamp_millis())
            .await?)
    }
}

async fn read_all(mut stream: ByteStream) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
}
