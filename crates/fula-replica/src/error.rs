//! Error types for the fula-replica crate

use crate::Namespace;
use thiserror::Error;

/// Result type alias using `ReplicaError`
pub type Result<T> = std::result::Result<T, ReplicaError>;

/// Errors surfaced by a replica connection
#[derive(Error, Debug, Clone)]
pub enum ReplicaError {
    /// The namespace has not been authenticated on this connection
    #[error("not authenticated for namespace {0}")]
    Unauthenticated(Namespace),

    /// The credential was rejected
    #[error("credential rejected for namespace {namespace}: {reason}")]
    CredentialRejected { namespace: Namespace, reason: String },

    /// The replica could not be reached
    #[error("replica unavailable: {0}")]
    Unavailable(String),

    /// A feed or watch was closed by the replica
    #[error("feed closed: {0}")]
    Closed(String),
}
