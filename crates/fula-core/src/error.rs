//! Error types for the fula-core crate

use fula_crypto::CryptoError;
use fula_replica::ReplicaError;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in metadata store operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// The store is not ready or the replica rejected our credentials
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// A required record is absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller input was rejected before any I/O
    #[error("validation failed: {0}")]
    Validation(String),

    /// Bucket already exists
    #[error("bucket already exists: {0}")]
    AlreadyExists(String),

    /// A point lookup could not be opened with our record key
    #[error("decryption failure: {0}")]
    DecryptionFailure(String),

    /// File metadata has no uuid
    #[error("file metadata has no uuid: {0}")]
    MissingUuid(String),

    /// The replica failed to serve a request
    #[error("remote operation failed: {0}")]
    RemoteOperationFailure(#[source] ReplicaError),

    /// Crypto error other than a failed open
    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store did not become ready in time
    #[error("timed out: {0}")]
    Timeout(String),

    /// Operation was cancelled
    #[error("cancelled")]
    Cancelled,
}

impl CoreError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error was raised before any I/O
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::MissingUuid(_))
    }
}

impl From<CryptoError> for CoreError {
    fn from(err: CryptoError) -> Self {
        if err.is_decryption_failure() {
            Self::DecryptionFailure(err.to_string())
        } else {
            Self::Crypto(err)
        }
    }
}

impl From<ReplicaError> for CoreError {
    fn from(err: ReplicaError) -> Self {
        match err {
            ReplicaError::Unauthenticated(_) | ReplicaError::CredentialRejected { .. } => {
                Self::Unauthenticated(err.to_string())
            }
            other => Self::RemoteOperationFailure(other),
        }
    }
}

impl From<base64::DecodeError> for CoreError {
    fn from(err: base64::DecodeError) -> Self {
        Self::DecryptionFailure(format!("record payload is not base64: {}", err))
    }
}
