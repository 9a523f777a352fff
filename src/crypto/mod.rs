//! Crypto Oracle
//!
//! The ledger treats key generation, signing, verification and hashing as
//! an oracle with named operations. Keys travel in their canonical DER
//! serialization; an owner's on-chain address (verification key) is the
//! SHA-256 of that serialization.

pub mod keys;

pub use keys::{Keypair, PublicKey};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Errors from the crypto oracle.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),
}

/// A SHA-256 digest.
///
/// The all-zero value doubles as the "empty" sentinel used before a record
/// is sealed (a nascent UTXO's producing hash, the genesis parent hash);
/// it serializes as the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const EMPTY: Hash = Hash([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_base64(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            BASE64.encode(self.0)
        }
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        if encoded.is_empty() {
            return Ok(Hash::EMPTY);
        }
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidDigest(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidDigest("digest must be 32 bytes".to_string()))?;
        Ok(Hash(bytes))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short hex form for logs.
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Hash::from_base64(&encoded).map_err(D::Error::custom)
    }
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> Hash {
    let digest = Sha256::digest(data);
    Hash(digest.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string.
        let hash = sha256(b"");
        assert_eq!(
            hex::encode(hash.as_bytes()),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_empty_hash_roundtrips_as_empty_string() {
        let encoded = serde_json::to_string(&Hash::EMPTY).unwrap();
        assert_eq!(encoded, "\"\"");
        let decoded: Hash = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, Hash::EMPTY);
    }

    #[test]
    fn test_hash_roundtrip() {
        let hash = sha256(b"sanchain");
        let encoded = serde_json::to_string(&hash).unwrap();
        let decoded: Hash = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, hash);
    }
}
