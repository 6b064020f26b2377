//! Sealed record wire shape: `{"data": "<base64 ciphertext>"}`

use crate::Result;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use fula_crypto::RecordKey;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Envelope around a sealed record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordEnvelope {
    /// Base64 of the sealed JSON record
    pub data: String,
}

impl RecordEnvelope {
    /// Serialize `value` and seal it under `key`
    pub fn seal<T: Serialize>(key: &RecordKey, value: &T) -> Result<Bytes> {
        let plaintext = serde_json::to_vec(value)?;
        let envelope = RecordEnvelope {
            data: STANDARD.encode(key.encrypt(&plaintext)?),
        };
        Ok(Bytes::from(serde_json::to_vec(&envelope)?))
    }

    /// Open a sealed record
    pub fn open<T: DeserializeOwned>(key: &RecordKey, raw: &[u8]) -> Result<T> {
        let envelope: RecordEnvelope = serde_json::from_slice(raw)?;
        let sealed = STANDARD.decode(envelope.data.as_bytes())?;
        let plaintext = key.decrypt(&sealed)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

/// Plaintext records in the public namespace
pub fn to_plain<T: Serialize>(value: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

pub fn from_plain<T: DeserializeOwned>(raw: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;

    #[test]
    fn test_envelope_is_json_with_data_field() {
        let key = RecordKey::generate();
        let raw = RecordEnvelope::seal(&key, &42u64).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert!(value["data"].is_string());
        assert_eq!(RecordEnvelope::open::<u64>(&key, &raw).unwrap(), 42);
    }

    #[test]
    fn test_foreign_key_is_decryption_failure() {
        let raw = RecordEnvelope::seal(&RecordKey::generate(), &"secret").unwrap();
        let result = RecordEnvelope::open::<String>(&RecordKey::generate(), &raw);
        assert!(matches!(result, Err(CoreError::DecryptionFailure(_))));
    }
}
