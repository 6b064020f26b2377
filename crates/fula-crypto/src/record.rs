//! 80-byte record keys
//!
//! Buckets and private metadata records are sealed with a composite key:
//!
//! ```text
//! ┌──────────────────┬──────────────┬──────────────────┐
//! │ AES key (32)     │ salt (16)    │ MAC key (32)     │
//! └──────────────────┴──────────────┴──────────────────┘
//! ```
//!
//! Sealed layout: `version(1) || nonce(12) || AES-256-GCM(ct, aad = salt) || mac(32)`
//! where the MAC is a keyed BLAKE3 over `version || nonce || ct`. The MAC is
//! checked before the AEAD is touched, so a foreign key fails fast.

use crate::{
    hashing::{keyed_mac, verify_mac},
    keys::{DekKey, NONCE_SIZE},
    symmetric::{Aead, Nonce},
    CryptoError, Result,
};
use rand::rngs::OsRng;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of the AES part
pub const AES_KEY_SIZE: usize = 32;
/// Length of the salt part
pub const SALT_SIZE: usize = 16;
/// Length of the MAC part
pub const MAC_KEY_SIZE: usize = 32;
/// Total record key length
pub const RECORD_KEY_SIZE: usize = AES_KEY_SIZE + SALT_SIZE + MAC_KEY_SIZE;

const RECORD_VERSION: u8 = 1;
const TAG_SIZE: usize = 16;
const MAC_SIZE: usize = 32;
const MIN_SEALED_LEN: usize = 1 + NONCE_SIZE + TAG_SIZE + MAC_SIZE;

/// Composite symmetric key sealing bucket contents and metadata records
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RecordKey {
    bytes: [u8; RECORD_KEY_SIZE],
}

impl RecordKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; RECORD_KEY_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        Self { bytes }
    }

    /// Create from the raw 80 bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != RECORD_KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "record key must be {} bytes, got {}",
                RECORD_KEY_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; RECORD_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; RECORD_KEY_SIZE] {
        &self.bytes
    }

    /// Hex form, used when a record key is itself stored inside a record
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse the hex form
    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_bytes(&hex::decode(s)?)
    }

    fn aes_key(&self) -> Result<DekKey> {
        DekKey::from_bytes(&self.bytes[..AES_KEY_SIZE])
    }

    fn salt(&self) -> &[u8] {
        &self.bytes[AES_KEY_SIZE..AES_KEY_SIZE + SALT_SIZE]
    }

    fn mac_key(&self) -> [u8; MAC_KEY_SIZE] {
        let mut key = [0u8; MAC_KEY_SIZE];
        key.copy_from_slice(&self.bytes[AES_KEY_SIZE + SALT_SIZE..]);
        key
    }

    /// Seal a payload
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::generate();
        let ciphertext = Aead::new_default(&self.aes_key()?).encrypt_with_aad(
            &nonce,
            plaintext,
            self.salt(),
        )?;
        let version = [RECORD_VERSION];
        let mac = keyed_mac(&self.mac_key(), &[&version, nonce.as_bytes(), &ciphertext]);

        let mut out = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len() + MAC_SIZE);
        out.push(RECORD_VERSION);
        out.extend_from_slice(nonce.as_bytes());
        out.extend_from_slice(&ciphertext);
        out.extend_from_slice(mac.as_bytes());
        Ok(out)
    }

    /// Open a sealed payload
    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < MIN_SEALED_LEN {
            return Err(CryptoError::InvalidCiphertext(format!(
                "sealed record too short: {} bytes",
                sealed.len()
            )));
        }
        if sealed[0] != RECORD_VERSION {
            return Err(CryptoError::InvalidCiphertext(format!(
                "unsupported record version {}",
                sealed[0]
            )));
        }
        let (body, mac) = sealed.split_at(sealed.len() - MAC_SIZE);
        let nonce = &body[1..1 + NONCE_SIZE];
        let ciphertext = &body[1 + NONCE_SIZE..];

        if !verify_mac(&self.mac_key(), &[&body[..1], nonce, ciphertext], mac) {
            return Err(CryptoError::Decryption("record MAC mismatch".to_string()));
        }

        Aead::new_default(&self.aes_key()?).decrypt_with_aad(
            &Nonce::from_bytes(nonce)?,
            ciphertext,
            self.salt(),
        )
    }
}

impl fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordKey(..)")
    }
}
