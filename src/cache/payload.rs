//! Payload Module
//!
//! What the facade hands to a storage driver: either a serialized value or a
//! sealed envelope around one.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Nonce length shared by AES-256-GCM and IETF ChaCha20-Poly1305
pub const NONCE_LEN: usize = 12;

/// Authentication tag appended to every ciphertext
pub const TAG_LEN: usize = 16;

// == Envelope ==
/// Nonce and ciphertext (with trailing tag) of one encrypted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Wire form: `nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.nonce.len() + self.ciphertext.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Splits a wire form back apart. Returns None when too short to hold a
    /// nonce and a tag.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return None;
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        Some(Self {
            nonce: nonce.to_vec(),
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// True when both fields are present in usable form.
    pub fn is_well_formed(&self) -> bool {
        self.nonce.len() == NONCE_LEN && self.ciphertext.len() >= TAG_LEN
    }
}

// == Payload ==
/// A record body as held by a storage driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Serialized value, stored as-is
    Plain(Vec<u8>),
    /// Serialized value sealed with the facade's secret key
    Sealed(Envelope),
}

// == Value Codec ==
/// Serializes a value for storage.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
}

/// Deserializes a stored value. None when the bytes do not decode as `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Stored value failed to deserialize: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_envelope_wire_form() {
        let envelope = Envelope {
            nonce: vec![7; NONCE_LEN],
            ciphertext: vec![9; TAG_LEN + 3],
        };
        let bytes = envelope.to_bytes();
        assert_eq!(bytes.len(), NONCE_LEN + TAG_LEN + 3);
        assert_eq!(Envelope::from_bytes(&bytes), Some(envelope));
    }

    #[test]
    fn test_envelope_from_short_bytes() {
        assert!(Envelope::from_bytes(&[0; NONCE_LEN + TAG_LEN - 1]).is_none());
    }

    #[test]
    fn test_envelope_well_formed() {
        let missing_nonce = Envelope {
            nonce: Vec::new(),
            ciphertext: vec![0; TAG_LEN],
        };
        let missing_ciphertext = Envelope {
            nonce: vec![0; NONCE_LEN],
            ciphertext: Vec::new(),
        };
        assert!(!missing_nonce.is_well_formed());
        assert!(!missing_ciphertext.is_well_formed());
    }

    #[test]
    fn test_decode_mismatched_type() {
        let bytes = encode("not a number").unwrap();
        assert_eq!(decode::<u32>(&bytes), None);
        assert_eq!(decode::<String>(&bytes).as_deref(), Some("not a number"));
    }

    #[test]
    fn test_encode_rejects_non_string_map_keys() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1);
        assert!(matches!(encode(&map), Err(CacheError::Serialization(_))));
    }
}
