//! # Fula Client SDK
//!
//! Encrypted buckets, ordered batch uploads and file sharing for Fula spaces.
//!
//! ## Features
//!
//! - **Encrypted metadata**: every private record is sealed with a key derived from the identity
//! - **Ordered uploads**: directories land before their contents, failures stay per-file
//! - **Sharing**: invitations delivered through sealed inbox messages
//! - **Pluggable backends**: object store, replica and mailbox are traits with in-memory implementations
//!
//! ## Example
//!
//! ```rust,ignore
//! use fula_client::{ClientConfig, EventKind, FulaSpace, MemoryMailboxHub, MemoryObjectStore, Session, UploadItem};
//! use fula_crypto::KekKeyPair;
//! use fula_replica::MemoryReplica;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     fula_client::init_tracing();
//!
//!     let config = ClientConfig::load()?;
//!     let session = Session::new(KekKeyPair::generate(), "session-token")?;
//!     let hub = MemoryMailboxHub::new();
//!     let mailbox = hub.mailbox_for(*session.public_key());
//!     let space = FulaSpace::open(
//!         session,
//!         Arc::new(MemoryReplica::new(config.public_token.clone())),
//!         Arc::new(MemoryObjectStore::new()),
//!         mailbox,
//!         config,
//!     )
//!     .await?;
//!
//!     space.create_bucket("photos").await?;
//!     let upload = space
//!         .add_items("photos", vec![UploadItem::new("/2024/beach.jpg", vec![0u8; 16])])
//!         .await?;
//!     upload.on(EventKind::Error, |event| eprintln!("{:?}", event));
//!     let summary = upload.wait().await?;
//!     println!("{} uploaded", summary.succeeded().count());
//!
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod events;
mod mailbox;
mod notifications;
mod object_store;
mod session;
mod sharing;
mod space;
mod types;
mod upload;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::{EventEmitter, EventKind, ListenerId, UploadEvent};
pub use mailbox::{InboxMessage, Mailbox, MemoryMailbox, MemoryMailboxHub};
pub use notifications::{MessageBody, Notification, NotificationType};
pub use object_store::{ByteStream, MemoryObjectStore, ObjectStore};
pub use session::{FileSessionStore, MemorySessionStore, PersistedSession, Session, SessionStore};
pub use sharing::{
    create_file_invitations, FullPath, Invitation, InvitationStatus, LocalTempKeyIssuer,
    ShareOutcome, ShareRecipient, TempKey, TempKeyIssuer,
};
pub use space::FulaSpace;
pub use types::*;
pub use upload::{UploadHandle, UploadPipeline};

// Records callers see through the facade
pub use fula_core::{BucketMetadata, FileMetadata, SharedFileMetadata, ShareUserMetadata};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a `RUST_LOG`-filtered fmt subscriber. Does nothing if one is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fula_client=info,fula_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
