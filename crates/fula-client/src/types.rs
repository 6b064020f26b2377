//! Common types for the client SDK

use bytes::Bytes;
use chrono::{DateTime, Utc};
use fula_core::FileMetadata;
use serde::{Deserialize, Serialize};

/// Root of a bucket at the object store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRoot {
    /// Root key addressing the bucket
    pub key: String,
    /// Replicated database backing the bucket
    pub db_id: String,
}

/// An entry in a bucket's directory tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirEntry {
    /// Full path, starting with `/`
    pub path: String,
    /// Last path segment
    pub name: String,
    pub is_dir: bool,
    /// Stored size in bytes
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A path and its immediate children
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathListing {
    pub entry: DirEntry,
    pub children: Vec<DirEntry>,
}

/// Content to push at a path
#[derive(Clone, Debug)]
pub struct PushItem {
    pub path: String,
    pub content: Bytes,
}

/// Access a public key holds on a path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessRole {
    Reader,
    Writer,
    Admin,
}

/// A file to add to a bucket
#[derive(Clone, Debug)]
pub struct UploadItem {
    /// Destination path
    pub path: String,
    /// Guessed from the path when absent
    pub mime_type: Option<String>,
    pub data: Bytes,
}

impl UploadItem {
    /// Create a new upload item
    pub fn new(path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            mime_type: None,
            data: data.into(),
        }
    }

    /// Set the MIME type
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Outcome of a single file in a batch upload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    Error,
}

/// Per-file result of a batch upload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileUploadResult {
    pub path: String,
    pub status: UploadStatus,
    /// Canonical entry, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<DirEntry>,
    /// Registered metadata, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FileMetadata>,
    /// Failure message, on error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileUploadResult {
    /// A successful upload
    pub fn success(path: String, entry: DirEntry, metadata: FileMetadata) -> Self {
        Self {
            path,
            status: UploadStatus::Success,
            entry: Some(entry),
            metadata: Some(metadata),
            error: None,
        }
    }

    /// A failed upload
    pub fn failure(path: String, error: impl ToString) -> Self {
        Self {
            path,
            status: UploadStatus::Error,
            entry: None,
            metadata: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UploadStatus::Success
    }
}

/// Final summary of a batch upload, in level order
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UploadSummary {
    pub bucket: String,
    pub results: Vec<FileUploadResult>,
}

impl UploadSummary {
    /// Results that succeeded
    pub fn succeeded(&self) -> impl Iterator<Item = &FileUploadResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    /// Results that failed
    pub fn failed(&self) -> impl Iterator<Item = &FileUploadResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}
