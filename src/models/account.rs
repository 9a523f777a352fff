//! Accounts
//!
//! An account is a keypair plus its derived on-chain address. Account
//! documents are JSON with base64 DER keys, the same shape clients use.
//! The protocol's reward identity is a constant account shipped with the
//! node; verifiers recognize it by exact DER comparison.

use crate::crypto::{CryptoError, Hash, Keypair, PublicKey};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Seed of the well-known reward-sender keypair. Its public key is the
/// identity of the protocol itself when emitting block rewards.
const REWARD_SENDER_SEED: [u8; 32] = [
    0x53, 0x61, 0x6e, 0x63, 0x68, 0x61, 0x69, 0x6e, 0x2d, 0x72, 0x65, 0x77, 0x61, 0x72, 0x64,
    0x2d, 0x73, 0x65, 0x6e, 0x64, 0x65, 0x72, 0x2d, 0x69, 0x64, 0x65, 0x6e, 0x74, 0x69, 0x74,
    0x79, 0x31,
];

/// A keypair with its derived verification key.
#[derive(Debug)]
pub struct Account {
    keypair: Keypair,
}

#[derive(Serialize, Deserialize)]
struct AccountDocument {
    public_key: String,
    private_key: String,
}

impl Account {
    pub fn generate() -> Self {
        Account {
            keypair: Keypair::generate(),
        }
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Account { keypair }
    }

    /// Deterministic account from a fixed seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Account {
            keypair: Keypair::from_seed(seed),
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        self.keypair.public()
    }

    /// The on-chain address: SHA-256 of the DER public key.
    pub fn address(&self) -> Hash {
        self.keypair.address()
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.keypair.sign(message)
    }

    /// Load an account document, checking the stored public key against
    /// the one derived from the private key.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read account at {}", path.display()))?;
        let document: AccountDocument = serde_json::from_str(&text)
            .with_context(|| format!("malformed account at {}", path.display()))?;
        Self::from_document(&document).context("invalid account keys")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let document = AccountDocument {
            public_key: self.keypair.public().to_base64(),
            private_key: BASE64.encode(self.keypair.to_pkcs8_der()),
        };
        let text = serde_json::to_string(&document).expect("account serializes infallibly");
        std::fs::write(path, text)
            .with_context(|| format!("failed to write account at {}", path.display()))
    }

    fn from_document(document: &AccountDocument) -> std::result::Result<Self, CryptoError> {
        let private_der = BASE64
            .decode(&document.private_key)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        let keypair = Keypair::from_pkcs8_der(&private_der)?;
        let stated = PublicKey::from_base64(&document.public_key)?;
        if &stated != keypair.public() {
            return Err(CryptoError::InvalidPublicKey(
                "stated public key does not match the private key".to_string(),
            ));
        }
        Ok(Account { keypair })
    }
}

/// The protocol's constant reward-sender account.
pub fn reward_sender() -> &'static Account {
    static REWARD_SENDER: OnceLock<Account> = OnceLock::new();
    REWARD_SENDER.get_or_init(|| Account {
        keypair: Keypair::from_seed(REWARD_SENDER_SEED),
    })
}

/// True iff `key` is the protocol reward identity, by DER comparison.
pub fn is_reward_sender(key: &PublicKey) -> bool {
    key.der() == reward_sender().public_key().der()
}
