//! # Fula Crypto
//!
//! Cryptographic primitives for the Fula client.
//!
//! This crate provides:
//! - **Record keys**: 80-byte composite keys sealing buckets and metadata records
//! - **Key derivation**: HKDF from the identity secret, Argon2id from a passphrase
//! - **Sealing**: X25519 + AEAD encryption to a recipient's public key for inbox payloads
//! - **BLAKE3**: hashing, keyed MACs and context-bound derivation
//!
//! ## Security Model
//!
//! - All encryption happens client-side
//! - The identity secret never leaves the client unless wrapped by a vault passphrase
//! - The replicated stores only ever see ciphertext, except records a user
//!   explicitly publishes
//!
//! ## Example
//!
//! ```rust,ignore
//! use fula_crypto::{derive_record_key, KekKeyPair};
//!
//! let identity = KekKeyPair::generate();
//! let key = derive_record_key(identity.secret_key())?;
//!
//! let sealed = key.encrypt(b"bucket record")?;
//! assert_eq!(key.decrypt(&sealed)?, b"bucket record");
//! ```

pub mod error;
pub mod hashing;
pub mod hpke;
pub mod kdf;
pub mod keys;
pub mod record;
pub mod symmetric;

pub use error::{CryptoError, Result};
pub use hashing::{Blake3Hash, HashOutput};
pub use hpke::{Decryptor, EncryptedData, Encryptor, HpkeConfig};
pub use kdf::{derive_record_key, KdfParams, VaultEnvelope, VaultKey};
pub use keys::{DekKey, KekKeyPair, PublicKey, SecretKey};
pub use record::{RecordKey, RECORD_KEY_SIZE};
pub use symmetric::{Aead, AeadCipher, Nonce};

/// The version of the cryptographic format
pub const CRYPTO_VERSION: u8 = 1;
