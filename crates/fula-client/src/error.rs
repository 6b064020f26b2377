//! Client error types

use fula_core::CoreError;
use fula_crypto::CryptoError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Metadata store error
    #[error(transparent)]
    Store(#[from] CoreError),

    /// Input rejected before any I/O
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bucket, file or message not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object store or mailbox failure
    #[error("Remote operation failed: {0}")]
    RemoteOperationFailure(String),

    /// Payload could not be opened with our keys
    #[error("Decryption failure: {0}")]
    DecryptionFailure(String),

    /// Crypto error other than a failed open
    #[error("Crypto error: {0}")]
    Crypto(CryptoError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Work was cancelled before it started
    #[error("Cancelled")]
    Cancelled,
}

impl ClientError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Store(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error was raised before any I/O
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Store(e) => e.is_validation(),
            _ => false,
        }
    }

    /// Check if a payload failed to open
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            Self::DecryptionFailure(_) | Self::Store(CoreError::DecryptionFailure(_))
        )
    }
}

impl From<CryptoError> for ClientError {
    fn from(err: CryptoError) -> Self {
        if err.is_decryption_failure() {
            Self::DecryptionFailure(err.to_string())
        } else {
            Self::Crypto(err)
        }
    }
}

impl From<config::ConfigError> for ClientError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates_look_through_store_errors() {
        let err = ClientError::from(CoreError::NotFound("bucket docs".to_string()));
        assert!(err.is_not_found());
        assert!(!err.is_validation());

        let err = ClientError::from(CoreError::MissingUuid("/a.txt".to_string()));
        assert!(err.is_validation());

        let err = ClientError::from(CryptoError::Decryption("mac".to_string()));
        assert!(err.is_decryption_failure());
    }
}
