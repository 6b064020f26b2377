//! Sealing payloads to a recipient's public key
//!
//! An ephemeral X25519 exchange derives a one-time DEK with BLAKE3; the
//! payload is then AEAD-encrypted under it. This is how inbox messages are
//! end-to-end encrypted: only the holder of the recipient secret key can
//! rebuild the shared secret.

use crate::{
    keys::{DekKey, KekKeyPair, PublicKey, SecretKey},
    symmetric::{Aead, AeadCipher, Nonce},
    CryptoError, Result, CRYPTO_VERSION,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

/// HPKE configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HpkeConfig {
    /// The AEAD cipher to use
    pub aead: AeadCipher,
    /// Key derivation context
    pub context: String,
}

impl Default for HpkeConfig {
    fn default() -> Self {
        Self {
            aead: AeadCipher::Aes256Gcm,
            context: "fula-inbox-seal-v1".to_string(),
        }
    }
}

mod base64_vec {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(&s)
            .map_err(serde::de::Error::custom)
    }
}

/// Encrypted data with all metadata needed for decryption
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct EncryptedData {
    /// Version of the encryption format
    pub version: u8,
    /// The sender's ephemeral public key
    pub ephemeral_public: PublicKey,
    /// The nonce used for AEAD
    pub nonce: Nonce,
    /// The AEAD cipher used
    pub cipher: AeadCipher,
    /// The encrypted ciphertext
    #[serde(with = "base64_vec")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Serialize for transport
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CryptoError::Serialization(e.to_string()))
    }

    /// Parse a transported payload
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let data: Self = serde_json::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidCiphertext(e.to_string()))?;
        if data.version != CRYPTO_VERSION {
            return Err(CryptoError::InvalidCiphertext(format!(
                "unsupported version {}",
                data.version
            )));
        }
        Ok(data)
    }
}

/// Encryptor for HPKE-based encryption
pub struct Encryptor {
    recipient_public: PublicKey,
    config: HpkeConfig,
}

impl Encryptor {
    /// Create a new encryptor for the given recipient
    pub fn new(recipient_public: &PublicKey) -> Self {
        Self::with_config(recipient_public, HpkeConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(recipient_public: &PublicKey, config: HpkeConfig) -> Self {
        Self {
            recipient_public: *recipient_public,
            config,
        }
    }

    /// Encrypt data for the recipient
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData> {
        let ephemeral_secret = StaticSecret::random_from_rng(OsRng);
        let ephemeral_public = X25519Public::from(&ephemeral_secret);

        let recipient = X25519Public::from(*self.recipient_public.as_bytes());
        let shared_secret = ephemeral_secret.diffie_hellman(&recipient);
        let dek = derive_dek(shared_secret.as_bytes(), &self.config.context)?;

        let nonce = Nonce::generate();
        let ciphertext = Aead::new(&dek, self.config.aead).encrypt(&nonce, plaintext)?;

        Ok(EncryptedData {
            version: CRYPTO_VERSION,
            ephemeral_public: PublicKey::from_bytes(ephemeral_public.as_bytes())?,
            nonce,
            cipher: self.config.aead,
            ciphertext,
        })
    }
}

/// Decryptor for HPKE-based decryption
pub struct Decryptor {
    secret: SecretKey,
    config: HpkeConfig,
}

impl Decryptor {
    /// Create a new decryptor with the recipient's key pair
    pub fn new(keypair: &KekKeyPair) -> Self {
        Self::from_secret_key(keypair.secret_key())
    }

    /// Create with the secret key directly
    pub fn from_secret_key(secret: &SecretKey) -> Self {
        Self {
            secret: secret.clone(),
            config: HpkeConfig::default(),
        }
    }

    /// Decrypt data
    pub fn decrypt(&self, encrypted: &EncryptedData) -> Result<Vec<u8>> {
        let recipient_secret = StaticSecret::from(*self.secret.as_bytes());
        let ephemeral_public = X25519Public::from(*encrypted.ephemeral_public.as_bytes());
        let shared_secret = recipient_secret.diffie_hellman(&ephemeral_public);
        let dek = derive_dek(shared_secret.as_bytes(), &self.config.context)?;

        Aead::new(&dek, encrypted.cipher).decrypt(&encrypted.nonce, &encrypted.ciphertext)
    }
}

fn derive_dek(shared_secret: &[u8], context: &str) -> Result<DekKey> {
    let derived = crate::hashing::derive_key(context, shared_secret);
    DekKey::from_bytes(derived.as_bytes())
}

/// Seal `plaintext` for `recipient` and serialize it for transport
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    Encryptor::new(recipient).encrypt(plaintext)?.to_bytes()
}

/// Open a payload produced by [`seal`]
pub fn open(secret: &SecretKey, sealed: &[u8]) -> Result<Vec<u8>> {
    let data = EncryptedData::from_bytes(sealed)?;
    Decryptor::from_secret_key(secret).decrypt(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let recipient = KekKeyPair::generate();
        let sealed = seal(recipient.public_key(), b"invitation").unwrap();
        let opened = open(recipient.secret_key(), &sealed).unwrap();
        assert_eq!(opened, b"invitation");
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let recipient = KekKeyPair::generate();
        let other = KekKeyPair::generate();
        let sealed = seal(recipient.public_key(), b"secret").unwrap();
        assert!(open(other.secret_key(), &sealed).is_err());
    }

    #[test]
    fn test_ciphertext_tampering_detected() {
        let recipient = KekKeyPair::generate();
        let mut encrypted = Encryptor::new(recipient.public_key()).encrypt(b"payload").unwrap();
        encrypted.ciphertext[0] ^= 0x01;
        assert!(Decryptor::new(&recipient).decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_semantic_security() {
        let recipient = KekKeyPair::generate();
        let a = Encryptor::new(recipient.public_key()).encrypt(b"same").unwrap();
        let b = Encryptor::new(recipient.public_key()).encrypt(b"same").unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_ne!(a.ephemeral_public, b.ephemeral_public);
    }

    #[test]
    fn test_garbage_payload_rejected() {
        let recipient = KekKeyPair::generate();
        let result = open(recipient.secret_key(), b"{not json");
        assert!(matches!(result, Err(CryptoError::InvalidCiphertext(_))));
    }
}
