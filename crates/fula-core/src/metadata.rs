//! Bucket, file and sharing records

use chrono::{DateTime, Utc};
use fula_crypto::RecordKey;
use serde::{Deserialize, Serialize};

/// A user's bucket.
///
/// `db_id` and `encryption_key` never change after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketMetadata {
    /// Bucket name, unique per user
    pub slug: String,
    /// Replicated database backing the bucket
    pub db_id: String,
    /// Object store root key
    pub bucket_key: String,
    /// Key sealing the bucket's files, stored hex-encoded
    #[serde(with = "record_key_hex")]
    pub encryption_key: RecordKey,
}

/// Metadata for a file inside a bucket.
///
/// Records are keyed by `(bucket_slug, db_id, path)` and, when present, by `uuid`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub bucket_slug: String,
    pub db_id: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
}

impl FileMetadata {
    /// Metadata with only the identifying fields set
    pub fn new(
        bucket_slug: impl Into<String>,
        db_id: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            bucket_slug: bucket_slug.into(),
            db_id: db_id.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set the uuid
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    /// Set the MIME type
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the file encryption key
    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    /// Apply `update` on top of `self`. Fields absent in the update keep their stored value.
    ///
    /// The uuid never changes once set, so the uuid index keeps a single entry per file.
    pub fn merge(self, update: FileMetadata) -> FileMetadata {
        FileMetadata {
            uuid: self.uuid.or(update.uuid),
            mime_type: update.mime_type.or(self.mime_type),
            bucket_slug: update.bucket_slug,
            db_id: update.db_id,
            path: update.path,
            encryption_key: update.encryption_key.or(self.encryption_key),
        }
    }
}

/// A file someone shared with us, or that we shared with someone
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedFileMetadata {
    #[serde(flatten)]
    pub file: FileMetadata,
    /// Public key of the sharer
    pub shared_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation_id: Option<String>,
    /// Object store root holding the file, needed to open it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_key: Option<String>,
}

/// Entry in the recently-shared-with directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareUserMetadata {
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_shared_at: Option<DateTime<Utc>>,
}

impl ShareUserMetadata {
    /// Directory entry for `public_key`, stamped now
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            label: None,
            last_shared_at: Some(Utc::now()),
        }
    }
}

mod record_key_hex {
    use fula_crypto::RecordKey;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &RecordKey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RecordKey, D::Error> {
        let s = String::deserialize(deserializer)?;
        RecordKey::from_hex(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_absent_fields() {
        let stored = FileMetadata::new("docs", "db1", "/a.txt")
            .with_uuid("u1")
            .with_mime_type("text/plain");
        let update = FileMetadata::new("docs", "db1", "/a.txt").with_encryption_key("k");

        let merged = stored.merge(update);
        assert_eq!(merged.uuid.as_deref(), Some("u1"));
        assert_eq!(merged.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(merged.encryption_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_merge_last_write_wins() {
        let stored = FileMetadata::new("docs", "db1", "/a.txt").with_mime_type("text/plain");
        let update = FileMetadata::new("docs", "db1", "/a.txt").with_mime_type("text/markdown");
        assert_eq!(
            stored.merge(update).mime_type.as_deref(),
            Some("text/markdown")
        );
    }

    #[test]
    fn test_merge_keeps_assigned_uuid() {
        let stored = FileMetadata::new("docs", "db1", "/a.txt").with_uuid("old");
        let update = FileMetadata::new("docs", "db1", "/a.txt").with_uuid("new");
        assert_eq!(stored.merge(update).uuid.as_deref(), Some("old"));

        let unassigned = FileMetadata::new("docs", "db1", "/a.txt");
        let update = FileMetadata::new("docs", "db1", "/a.txt").with_uuid("new");
        assert_eq!(unassigned.merge(update).uuid.as_deref(), Some("new"));
    }

    #[test]
    fn test_bucket_metadata_wire_shape() {
        let bucket = BucketMetadata {
            slug: "docs".to_string(),
            db_id: "db1".to_string(),
            bucket_key: "root".to_string(),
            encryption_key: RecordKey::generate(),
        };
        let json = serde_json::to_value(&bucket).unwrap();
        assert_eq!(json["dbId"], "db1");
        assert_eq!(json["encryptionKey"].as_str().unwrap().len(), 160);

        let parsed: BucketMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, bucket);
    }

    #[test]
    fn test_shared_file_flattens_file_fields() {
        let shared = SharedFileMetadata {
            file: FileMetadata::new("docs", "db1", "/a.txt"),
            shared_by: "ab".to_string(),
            invitation_id: Some("inv".to_string()),
            bucket_key: None,
        };
        let json = serde_json::to_value(&shared).unwrap();
        assert_eq!(json["bucketSlug"], "docs");
        assert_eq!(json["sharedBy"], "ab");
        assert_eq!(json["invitationId"], "inv");
    }
}
