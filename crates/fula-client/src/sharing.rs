//! Share invitations
//!
//! An invitation bundles the shared paths with the encryption keys of the
//! buckets holding them. Each distinct `(bucket, dbId)` among the paths
//! contributes one key, in first-seen order.

use crate::{ClientError, Result};
use async_trait::async_trait;
use fula_core::{BucketMetadata, MetadataStore};
use fula_crypto::{KekKeyPair, PublicKey};
use fula_replica::Replica;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Lifecycle of an invitation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A file reference inside an invitation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullPath {
    pub path: String,
    /// Bucket slug
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl FullPath {
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            bucket: bucket.into(),
            bucket_key: None,
            db_id: None,
            uuid: None,
        }
    }

    fn enriched(&self, bucket: &BucketMetadata) -> Self {
        Self {
            bucket_key: Some(bucket.bucket_key.clone()),
            db_id: Some(bucket.db_id.clone()),
            ..self.clone()
        }
    }
}

/// A share offer from one user to another
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub inviter_public_key: String,
    pub invitee_public_key: String,
    #[serde(rename = "invitationID")]
    pub invitation_id: String,
    pub status: InvitationStatus,
    pub item_paths: Vec<FullPath>,
    /// Hex bucket encryption keys, one per distinct bucket among `item_paths`
    pub keys: Vec<String>,
}

impl Invitation {
    /// The encryption key sealing `path`'s bucket
    pub fn key_for(&self, path: &FullPath) -> Option<&str> {
        let mut seen: Vec<(&str, Option<&str>)> = Vec::new();
        for item in &self.item_paths {
            let id = (item.bucket.as_str(), item.db_id.as_deref());
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        let target = (path.bucket.as_str(), path.db_id.as_deref());
        seen.iter()
            .position(|id| *id == target)
            .and_then(|i| self.keys.get(i))
            .map(String::as_str)
    }

    /// Copy of this invitation with a new status
    pub fn with_status(&self, status: InvitationStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

/// Who a share goes to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareRecipient {
    /// A user with a known public key, reached through the inbox
    Existing(PublicKey),
    /// Someone without a key yet, identified by email or phone number
    Temp(String),
}

impl ShareRecipient {
    /// Emails and `+` phone numbers are temp recipients; anything else must be a public key
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.contains('@') || s.starts_with('+') {
            return Ok(Self::Temp(s.to_string()));
        }
        PublicKey::parse(s)
            .map(Self::Existing)
            .map_err(|e| ClientError::Validation(format!("invalid recipient {:?}: {}", s, e)))
    }
}

/// A key issued for a temp recipient, handed over out of band
#[derive(Clone, Debug)]
pub struct TempKey {
    pub label: String,
    pub public_key: PublicKey,
    /// Base64 identity secret for the recipient
    pub secret_key: String,
}

/// Issues keys for recipients that have none yet
#[async_trait]
pub trait TempKeyIssuer: Send + Sync {
    async fn issue(&self, label: &str) -> Result<TempKey>;
}

/// Generates a fresh identity locally
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalTempKeyIssuer;

#[async_trait]
impl TempKeyIssuer for LocalTempKeyIssuer {
    async fn issue(&self, label: &str) -> Result<TempKey> {
        let identity = KekKeyPair::generate();
        Ok(TempKey {
            label: label.to_string(),
            public_key: *identity.public_key(),
            secret_key: identity.secret_key().to_base64(),
        })
    }
}

/// Result of sharing files
#[derive(Clone, Debug, Default)]
pub struct ShareOutcome {
    pub invitations: Vec<Invitation>,
    pub temp_keys: Vec<TempKey>,
}

/// Check paths before any lookup
pub(crate) fn validate_paths(paths: &[FullPath]) -> Result<()> {
    if paths.is_empty() {
        return Err(ClientError::Validation("no paths to share".to_string()));
    }
    if let Some(bad) = paths.iter().find(|p| p.bucket.is_empty() || p.path.is_empty()) {
        return Err(ClientError::Validation(format!(
            "path {:?} in bucket {:?} is incomplete",
            bad.path, bad.bucket
        )));
    }
    Ok(())
}

/// Build one pending invitation per recipient, in recipient order
#[instrument(skip_all, fields(paths = paths.len(), recipients = recipients.len()))]
pub async fn create_file_invitations<R: Replica>(
    inviter: &PublicKey,
    paths: &[FullPath],
    recipients: &[String],
    store: &MetadataStore<R>,
) -> Result<Vec<Invitation>> {
    if recipients.is_empty() {
        return Err(ClientError::Validation("no recipients".to_string()));
    }
    let recipients = recipients
        .iter()
        .map(|r| {
            PublicKey::parse(r)
                .map_err(|e| ClientError::Validation(format!("invalid public key {:?}: {}", r, e)))
        })
        .collect::<Result<Vec<_>>>()?;
    validate_paths(paths)?;

    let mut buckets: HashMap<&str, BucketMetadata> = HashMap::new();
    for path in paths {
        if buckets.contains_key(path.bucket.as_str()) {
            continue;
        }
        let bucket = store
            .find_bucket(&path.bucket)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("bucket {}", path.bucket)))?;
        buckets.insert(path.bucket.as_str(), bucket);
    }

    let mut item_paths = Vec::with_capacity(paths.len());
    let mut keys = Vec::new();
    let mut seen = Vec::new();
    for path in paths {
        let bucket = &buckets[path.bucket.as_str()];
        let id = (bucket.slug.clone(), bucket.db_id.clone());
        if !seen.contains(&id) {
            seen.push(id);
            keys.push(bucket.encryption_key.to_hex());
        }
        item_paths.push(path.enriched(bucket));
    }

    let inviter = inviter.to_hex();
    let invitations: Vec<Invitation> = recipients
        .iter()
        .map(|invitee| Invitation {
            inviter_public_key: inviter.clone(),
            invitee_public_key: invitee.to_hex(),
            invitation_id: uuid::Uuid::new_v4().to_string(),
            status: InvitationStatus::Pending,
            item_paths: item_paths.clone(),
            keys: keys.clone(),
        })
        .collect();
    debug!(count = invitations.len(), keys = keys.len(), "invitations created");
    Ok(invitations)
}
