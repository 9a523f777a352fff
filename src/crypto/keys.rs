//! Keypairs and Verification Keys
//!
//! Ed25519 keys carried in their DER serialization (SPKI for public keys,
//! PKCS#8 for private keys). Two keys are the same identity iff their DER
//! bytes are identical, so the DER form is the unit of comparison and the
//! input to address derivation.

use crate::crypto::{sha256, CryptoError, Hash};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A public key, held as its canonical DER (SPKI) serialization.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    der: Vec<u8>,
    key: VerifyingKey,
}

impl PublicKey {
    /// Parse a DER-serialized public key.
    pub fn from_der(der: Vec<u8>) -> Result<Self, CryptoError> {
        let key = VerifyingKey::from_public_key_der(&der)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(PublicKey { der, key })
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let der = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Self::from_der(der)
    }

    /// The canonical DER bytes.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.der)
    }

    /// The owner address: SHA-256 of the DER serialization.
    pub fn address(&self) -> Hash {
        sha256(&self.der)
    }

    /// Check `signature` over `message` against this key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let signature = Signature::from_slice(signature)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        self.key
            .verify(message, &signature)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.address())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        PublicKey::from_base64(&encoded).map_err(D::Error::custom)
    }
}

/// A signing keypair.
pub struct Keypair {
    signing: SigningKey,
    public: PublicKey,
}

impl Keypair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(signing)
    }

    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(&seed))
    }

    /// Parse a PKCS#8 DER-serialized private key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, CryptoError> {
        let signing = SigningKey::from_pkcs8_der(der)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::from_signing_key(signing))
    }

    fn from_signing_key(signing: SigningKey) -> Self {
        let der = signing
            .verifying_key()
            .to_public_key_der()
            .expect("ed25519 public keys always encode")
            .into_vec();
        let public = PublicKey {
            der,
            key: signing.verifying_key(),
        };
        Keypair { signing, public }
    }

    /// The PKCS#8 DER serialization of the private key.
    pub fn to_pkcs8_der(&self) -> Vec<u8> {
        self.signing
            .to_pkcs8_der()
            .expect("ed25519 private keys always encode")
            .as_bytes()
            .to_vec()
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn address(&self) -> Hash {
        self.public.address()
    }

    /// Sign `message`, returning the detached signature bytes.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing.sign(message).to_bytes().to_vec()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.public.address())
    }
}
