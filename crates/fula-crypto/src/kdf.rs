//! Key derivation
//!
//! - The record key that seals a user's private metadata is derived from the
//!   identity secret with HKDF-SHA256, so every device holding the identity
//!   reaches the same key without storing it.
//! - A vault key is stretched from a passphrase with Argon2id and used to
//!   wrap the identity secret for backup.

use crate::{
    keys::{KekKeyPair, SecretKey},
    record::{RecordKey, RECORD_KEY_SIZE},
    CryptoError, Result,
};
use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

const RECORD_KEY_SALT: &[u8] = b"fula-record-key-v1";
const RECORD_KEY_INFO: &[u8] = b"metadata-records";

/// Vault salt length
pub const VAULT_SALT_SIZE: usize = 16;

/// Derive the per-user record key from the identity secret
pub fn derive_record_key(identity: &SecretKey) -> Result<RecordKey> {
    let hk = Hkdf::<Sha256>::new(Some(RECORD_KEY_SALT), identity.as_bytes());
    let mut okm = [0u8; RECORD_KEY_SIZE];
    hk.expand(RECORD_KEY_INFO, &mut okm)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    RecordKey::from_bytes(&okm)
}

/// Argon2id cost parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests and constrained devices
    pub fn interactive() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// A key stretched from a passphrase
pub struct VaultKey {
    key: RecordKey,
}

impl VaultKey {
    /// Stretch `passphrase` with Argon2id
    pub fn derive(passphrase: &str, salt: &[u8], params: KdfParams) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(CryptoError::KeyGeneration("passphrase is empty".to_string()));
        }
        let argon_params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            Some(RECORD_KEY_SIZE),
        )
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

        let mut okm = [0u8; RECORD_KEY_SIZE];
        argon
            .hash_password_into(passphrase.as_bytes(), salt, &mut okm)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Ok(Self {
            key: RecordKey::from_bytes(&okm)?,
        })
    }

    /// Wrap an identity for backup
    pub fn seal_identity(&self, identity: &KekKeyPair) -> Result<Vec<u8>> {
        self.key.encrypt(identity.secret_key().as_bytes())
    }

    /// Recover an identity from its backup
    pub fn open_identity(&self, sealed: &[u8]) -> Result<KekKeyPair> {
        let secret = SecretKey::from_bytes(&self.key.decrypt(sealed)?)?;
        Ok(KekKeyPair::from_secret_key(secret))
    }
}

/// A passphrase-wrapped identity, safe to hand to a backup service
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultEnvelope {
    /// Hex-encoded Argon2 salt
    pub salt: String,
    /// Cost parameters used for the stretch
    pub params: KdfParams,
    /// Hex-encoded sealed identity secret
    pub sealed_identity: String,
}

impl VaultEnvelope {
    /// Wrap `identity` under `passphrase` with a fresh salt
    pub fn seal(identity: &KekKeyPair, passphrase: &str, params: KdfParams) -> Result<Self> {
        let mut salt = [0u8; VAULT_SALT_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut salt);
        let vault = VaultKey::derive(passphrase, &salt, params)?;
        Ok(Self {
            salt: hex::encode(salt),
            params,
            sealed_identity: hex::encode(vault.seal_identity(identity)?),
        })
    }

    /// Unwrap with `passphrase`
    pub fn open(&self, passphrase: &str) -> Result<KekKeyPair> {
        let salt = hex::decode(&self.salt)?;
        let vault = VaultKey::derive(passphrase, &salt, self.params)?;
        vault.open_identity(&hex::decode(&self.sealed_identity)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_is_deterministic_per_identity() {
        let identity = KekKeyPair::generate();
        let a = derive_record_key(identity.secret_key()).unwrap();
        let b = derive_record_key(identity.secret_key()).unwrap();
        let other = derive_record_key(KekKeyPair::generate().secret_key()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, other);
    }

    #[test]
    fn test_vault_roundtrip() {
        let identity = KekKeyPair::generate();
        let envelope =
            VaultEnvelope::seal(&identity, "correct horse", KdfParams::interactive()).unwrap();
        let restored = envelope.open("correct horse").unwrap();
        assert_eq!(restored.public_key(), identity.public_key());
    }

    #[test]
    fn test_vault_wrong_passphrase_fails() {
        let identity = KekKeyPair::generate();
        let envelope =
            VaultEnvelope::seal(&identity, "correct horse", KdfParams::interactive()).unwrap();
        assert!(envelope.open("battery staple").is_err());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let result = VaultKey::derive("", &[0u8; VAULT_SALT_SIZE], KdfParams::interactive());
        assert!(matches!(result, Err(CryptoError::KeyGeneration(_))));
    }
}
