//! Symmetric encryption using AES-GCM and ChaCha20-Poly1305
//!
//! Both ciphers share one code path; `Aead` picks the implementation from
//! `AeadCipher` and maps the opaque `aead::Error` into `CryptoError`.

use crate::{
    keys::{DekKey, KEY_SIZE, NONCE_SIZE},
    CryptoError, Result,
};
use aes_gcm::{
    aead::{Aead as AeadTrait, Payload},
    Aes256Gcm, KeyInit,
};
use chacha20poly1305::ChaCha20Poly1305;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// A nonce for AEAD encryption
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce {
    bytes: [u8; NONCE_SIZE],
}

impl Nonce {
    /// Generate a random nonce
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        Self { bytes }
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonce(format!(
                "nonce must be {} bytes, got {}",
                NONCE_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; NONCE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the nonce bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.bytes
    }
}

/// Supported AEAD ciphers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AeadCipher {
    /// AES-256-GCM
    #[default]
    Aes256Gcm,
    /// ChaCha20-Poly1305
    ChaCha20Poly1305,
}

impl AeadCipher {
    /// Get the algorithm identifier string
    pub fn algorithm_id(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "AES-256-GCM",
            Self::ChaCha20Poly1305 => "ChaCha20-Poly1305",
        }
    }

    /// Authentication tag size; both ciphers use 128-bit tags
    pub fn tag_size(&self) -> usize {
        16
    }
}

/// AEAD encryption/decryption interface
pub struct Aead {
    cipher: AeadCipher,
    key: [u8; KEY_SIZE],
}

impl Aead {
    /// Create a new AEAD instance with the given key and cipher
    pub fn new(key: &DekKey, cipher: AeadCipher) -> Self {
        Self {
            cipher,
            key: *key.as_bytes(),
        }
    }

    /// Create with the default cipher (AES-256-GCM)
    pub fn new_default(key: &DekKey) -> Self {
        Self::new(key, AeadCipher::default())
    }

    /// Encrypt data with the given nonce
    pub fn encrypt(&self, nonce: &Nonce, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.encrypt_with_aad(nonce, plaintext, &[])
    }

    /// Encrypt data with the given nonce and associated data
    pub fn encrypt_with_aad(&self, nonce: &Nonce, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let payload = Payload { msg: plaintext, aad };
        let sealed = match self.cipher {
            AeadCipher::Aes256Gcm => Aes256Gcm::new_from_slice(&self.key)
                .map_err(|e| CryptoError::Encryption(e.to_string()))?
                .encrypt(aes_gcm::Nonce::from_slice(nonce.as_bytes()), payload),
            AeadCipher::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(&self.key)
                .map_err(|e| CryptoError::Encryption(e.to_string()))?
                .encrypt(chacha20poly1305::Nonce::from_slice(nonce.as_bytes()), payload),
        };
        sealed.map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    /// Decrypt data with the given nonce
    pub fn decrypt(&self, nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.decrypt_with_aad(nonce, ciphertext, &[])
    }

    /// Decrypt data with the given nonce and associated data
    pub fn decrypt_with_aad(&self, nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let payload = Payload { msg: ciphertext, aad };
        let opened = match self.cipher {
            AeadCipher::Aes256Gcm => Aes256Gcm::new_from_slice(&self.key)
                .map_err(|e| CryptoError::Decryption(e.to_string()))?
                .decrypt(aes_gcm::Nonce::from_slice(nonce.as_bytes()), payload),
            AeadCipher::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(&self.key)
                .map_err(|e| CryptoError::Decryption(e.to_string()))?
                .decrypt(chacha20poly1305::Nonce::from_slice(nonce.as_bytes()), payload),
        };
        opened.map_err(|e| CryptoError::Decryption(e.to_string()))
    }

    /// Get the cipher type
    pub fn cipher(&self) -> AeadCipher {
        self.cipher
    }
}

/// Encrypt data with a generated nonce (convenience function)
pub fn encrypt(key: &DekKey, plaintext: &[u8]) -> Result<(Nonce, Vec<u8>)> {
    let nonce = Nonce::generate();
    let ciphertext = Aead::new_default(key).encrypt(&nonce, plaintext)?;
    Ok((nonce, ciphertext))
}

/// Decrypt data (convenience function)
pub fn decrypt(key: &DekKey, nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
    Aead::new_default(key).decrypt(nonce, ciphertext)
}
