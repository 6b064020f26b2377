//! BLAKE3 helpers: plain hashes, keyed MACs and context-bound key derivation

use crate::{CryptoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of a BLAKE3 hash output in bytes (256 bits)
pub const HASH_BYTE_SIZE: usize = 32;

/// Type alias for hash output bytes
pub type HashOutput = [u8; HASH_BYTE_SIZE];

/// A BLAKE3 hash wrapper with convenience methods
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Blake3Hash(HashOutput);

impl Blake3Hash {
    /// Create a hash from a hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        if bytes.len() != HASH_BYTE_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "hash must be {} bytes, got {}",
                HASH_BYTE_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; HASH_BYTE_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Get the hash as bytes
    pub fn as_bytes(&self) -> &HashOutput {
        &self.0
    }

    /// Convert to a hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3Hash({})", self.to_hex())
    }
}

impl fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<blake3::Hash> for Blake3Hash {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

/// Hash the given data using BLAKE3
pub fn hash(data: &[u8]) -> Blake3Hash {
    blake3::hash(data).into()
}

/// Derive a key from the given input and context
pub fn derive_key(context: &str, input: &[u8]) -> Blake3Hash {
    Blake3Hash(blake3::derive_key(context, input))
}

/// Keyed BLAKE3 MAC over the concatenation of `parts`
pub fn keyed_mac(key: &[u8; 32], parts: &[&[u8]]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new_keyed(key);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize()
}

/// Verify a keyed MAC in constant time
pub fn verify_mac(key: &[u8; 32], parts: &[&[u8]], tag: &[u8]) -> bool {
    let Ok(tag) = <[u8; HASH_BYTE_SIZE]>::try_from(tag) else {
        return false;
    };
    // blake3::Hash equality is constant time
    keyed_mac(key, parts) == blake3::Hash::from(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consistency() {
        assert_eq!(hash(b"test data"), hash(b"test data"));
        assert_ne!(hash(b"test data"), hash(b"other data"));
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let h = hash(b"test");
        assert_eq!(Blake3Hash::from_hex(&h.to_hex()).unwrap(), h);
    }

    #[test]
    fn test_derive_key_is_context_bound() {
        assert_ne!(derive_key("context1", b"input"), derive_key("context2", b"input"));
    }

    #[test]
    fn test_derive_key_matches_blake3() {
        let derived = derive_key("fula inbox", b"shared secret");
        assert_eq!(
            derived.as_bytes(),
            &blake3::derive_key("fula inbox", b"shared secret")
        );
    }

    #[test]
    fn test_mac_verification() {
        let key = [7u8; 32];
        let tag = keyed_mac(&key, &[b"nonce", b"ciphertext"]);
        assert!(verify_mac(&key, &[b"nonce", b"ciphertext"], tag.as_bytes()));
        assert!(!verify_mac(&key, &[b"nonce", b"tampered"], tag.as_bytes()));
        assert!(!verify_mac(&[8u8; 32], &[b"nonce", b"ciphertext"], tag.as_bytes()));
        assert!(!verify_mac(&key, &[b"nonce", b"ciphertext"], &tag.as_bytes()[..16]));
    }
}
