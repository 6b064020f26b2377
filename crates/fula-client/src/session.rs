//! Sessions: identity, token and the derived record key
//!
//! A session is created from the identity provider's output (a keypair and a
//! session token) and can be persisted through a [`SessionStore`] so the next
//! start does not have to authenticate again.

use crate::{ClientConfig, ClientError, Result};
use async_trait::async_trait;
use fula_core::StoreIdentity;
use fula_crypto::{
    derive_record_key, KdfParams, KekKeyPair, PublicKey, RecordKey, SecretKey, VaultEnvelope,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, instrument};

/// An authenticated user
pub struct Session {
    identity: KekKeyPair,
    token: String,
    record_key: RecordKey,
}

impl Session {
    /// Build a session from an identity and its session token
    pub fn new(identity: KekKeyPair, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(ClientError::Validation("session token cannot be empty".to_string()));
        }
        let record_key = derive_record_key(identity.secret_key())?;
        Ok(Self {
            identity,
            token,
            record_key,
        })
    }

    /// Restore an identity from a passphrase-wrapped backup
    pub fn from_vault(
        envelope: &VaultEnvelope,
        passphrase: &str,
        token: impl Into<String>,
    ) -> Result<Self> {
        Self::new(envelope.open(passphrase)?, token)
    }

    /// Wrap the identity under `passphrase` for backup
    pub fn export_vault(&self, passphrase: &str, params: KdfParams) -> Result<VaultEnvelope> {
        Ok(VaultEnvelope::seal(&self.identity, passphrase, params)?)
    }

    pub fn identity(&self) -> &KekKeyPair {
        &self.identity
    }

    pub fn public_key(&self) -> &PublicKey {
        self.identity.public_key()
    }

    /// Owner id used for namespaces and record keys
    pub fn owner_id(&self) -> String {
        self.identity.public_key().to_hex()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn record_key(&self) -> &RecordKey {
        &self.record_key
    }

    /// Credentials for the metadata store
    pub fn store_identity(&self) -> StoreIdentity {
        StoreIdentity {
            owner: self.owner_id(),
            token: self.token.clone(),
            record_key: self.record_key.clone(),
        }
    }

    /// Serializable form
    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            secret_key: self.identity.secret_key().to_base64(),
            token: self.token.clone(),
        }
    }

    /// Rebuild from the serializable form
    pub fn from_persisted(persisted: &PersistedSession) -> Result<Self> {
        let secret = SecretKey::from_base64(&persisted.secret_key)?;
        Self::new(KekKeyPair::from_secret_key(secret), persisted.token.clone())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("public_key", self.public_key())
            .finish_non_exhaustive()
    }
}

/// What a [`SessionStore`] keeps
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    /// Base64 identity secret
    pub secret_key: String,
    pub token: String,
}

/// Load and persist hooks for sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The stored session, if any
    async fn load(&self) -> Result<Option<Session>>;

    /// Replace the stored session
    async fn persist(&self, session: &Session) -> Result<()>;

    /// Forget the stored session
    async fn clear(&self) -> Result<()>;
}

/// Session kept in a JSON file
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the config's `session_file`, if one is set
    pub fn from_config(config: &ClientConfig) -> Option<Self> {
        config.session_file.as_ref().map(Self::new)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<Session>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let persisted: PersistedSession = serde_json::from_slice(&raw)?;
        debug!("session loaded");
        Session::from_persisted(&persisted).map(Some)
    }

    #[instrument(skip(self, session), fields(path = %self.path.display()))]
    async fn persist(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec_pretty(&session.to_persisted())?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Session kept in memory
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<PersistedSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        let persisted = self.inner.lock().clone();
        persisted.as_ref().map(Session::from_persisted).transpose()
    }

    async fn persist(&self, session: &Session) -> Result<()> {
        *self.inner.lock() = Some(session.to_persisted());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.inner.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_rejected() {
        let result = Session::new(KekKeyPair::generate(), "");
        assert!(result.unwrap_err().is_validation());
    }

    #[test]
    fn test_record_key_follows_identity() {
        let identity = KekKeyPair::generate();
        let a = Session::new(identity.clone(), "t1").unwrap();
        let b = Session::new(identity, "t2").unwrap();
        assert_eq!(a.record_key(), b.record_key());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested/session.json"));
        assert!(store.load().await.unwrap().is_none());

        let session = Session::new(KekKeyPair::generate(), "token").unwrap();
        store.persist(&session).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.public_key(), session.public_key());
        assert_eq!(loaded.token(), "token");

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_from_config() {
        assert!(FileSessionStore::from_config(&ClientConfig::default()).is_none());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let config = ClientConfig::new("svc").with_session_file(&path);
        let store = FileSessionStore::from_config(&config).unwrap();

        let session = Session::new(KekKeyPair::generate(), "token").unwrap();
        store.persist(&session).await.unwrap();
        assert!(path.exists());
        let reopened = FileSessionStore::from_config(&config).unwrap();
        assert_eq!(
            reopened.load().await.unwrap().unwrap().owner_id(),
            session.owner_id()
        );
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemorySessionStore::new();
        let session = Session::new(KekKeyPair::generate(), "token").unwrap();
        store.persist(&session).await.unwrap();
        assert_eq!(
            store.load().await.unwrap().unwrap().owner_id(),
            session.owner_id()
        );
    }

    #[test]
    fn test_vault_restores_same_owner() {
        let session = Session::new(KekKeyPair::generate(), "token").unwrap();
        let envelope = session
            .export_vault("hunter2 hunter2", KdfParams::interactive())
            .unwrap();
        let restored = Session::from_vault(&envelope, "hunter2 hunter2", "new-token").unwrap();
        assert_eq!(restored.owner_id(), session.owner_id());
        assert!(Session::from_vault(&envelope, "wrong", "t").is_err());
    }
}
