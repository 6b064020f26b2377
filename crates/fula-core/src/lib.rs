//! # Fula Core
//!
//! Encrypted metadata and path ordering for Fula spaces.
//!
//! This crate provides:
//! - **Metadata Store**: sealed bucket, file and sharing records over a replica
//! - **List Caches**: collection snapshots kept current by background tasks
//! - **Path Orderer**: ancestor-before-descendant batching of upload paths
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Upload Pipeline / Sharing        │
//! ├─────────────────────────────────────────┤
//! │   Metadata Store     │   Path Orderer   │
//! ├──────────────────────┤                  │
//! │  Record Envelopes    │                  │
//! ├──────────────────────┴──────────────────┤
//! │             Replica (trait)             │
//! └─────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod envelope;
pub mod error;
pub mod metadata;
pub mod orderer;
pub mod schema;
pub mod store;

pub use cache::ListCache;
pub use error::{CoreError, Result};
pub use metadata::{BucketMetadata, FileMetadata, SharedFileMetadata, ShareUserMetadata};
pub use orderer::{sanitize_path, segments, PathOrderer};
pub use store::{MetadataStore, StoreConfig, StoreIdentity, StoreState};
