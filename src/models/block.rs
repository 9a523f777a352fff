//! Blocks
//!
//! A block carries its transactions (reward last), the Merkle root over
//! their seal hashes, the proof-of-work hash and nonce, and a snapshot of
//! the chain config at mining time.

use crate::crypto::{sha256, Hash};
use crate::error::LedgerError;
use crate::models::config::ChainConfig;
use crate::models::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A mined block.
///
/// Field declaration order is the canonical encoding key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Chain height; the parent is `index - 1`.
    pub index: u64,
    /// Unix seconds at mining time.
    pub timestamp: u64,
    pub merkle_root: Hash,
    pub hash: Hash,
    pub nonce: u64,
    /// The last entry is always the block reward.
    pub transactions: Vec<Transaction>,
    /// Chain config as of mining this block.
    pub config: ChainConfig,
}

/// Serialize-only proof-of-work preimage: the canonical map without
/// `hash` and `nonce`.
#[derive(Serialize)]
struct PowPreimage<'a> {
    index: u64,
    timestamp: u64,
    merkle_root: &'a Hash,
    transactions: &'a [Transaction],
    config: &'a ChainConfig,
}

impl Block {
    /// The canonical bytes hashed by the proof-of-work search.
    pub fn pow_preimage_bytes(&self) -> Vec<u8> {
        let preimage = PowPreimage {
            index: self.index,
            timestamp: self.timestamp,
            merkle_root: &self.merkle_root,
            transactions: &self.transactions,
            config: &self.config,
        };
        crate::canonical::to_canonical_vec(&preimage)
    }

    /// The block reward, by construction the last transaction.
    pub fn reward_transaction(&self) -> Option<&Transaction> {
        self.transactions.last().filter(|tx| tx.is_reward())
    }

    /// Recompute the Merkle root and proof-of-work hash and compare them
    /// against the stored values.
    pub fn check_integrity(&self) -> Result<(), LedgerError> {
        let hashes: Vec<Hash> = self.transactions.iter().map(|tx| tx.hash).collect();
        let recomputed_root = merkle_root(&hashes);
        if recomputed_root != self.merkle_root {
            return Err(LedgerError::EncodingMismatch {
                kind: "block merkle root",
                stored: self.merkle_root.to_base64(),
                recomputed: recomputed_root.to_base64(),
            });
        }

        let recomputed = pow_hash(&self.pow_preimage_bytes(), self.nonce);
        if recomputed != self.hash {
            return Err(LedgerError::EncodingMismatch {
                kind: "block",
                stored: self.hash.to_base64(),
                recomputed: recomputed.to_base64(),
            });
        }
        Ok(())
    }
}

/// Merkle root over a list of transaction hashes.
///
/// Adjacent pairs fold as `sha256(left ++ right)`; an odd tail is hashed
/// alone rather than duplicated; the empty list folds to the zero hash.
pub fn merkle_root(hashes: &[Hash]) -> Hash {
    if hashes.is_empty() {
        return Hash::EMPTY;
    }

    let mut level: Vec<Hash> = hashes.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let combined = match pair {
                [left, right] => {
                    let mut data = Vec::with_capacity(64);
                    data.extend_from_slice(left.as_bytes());
                    data.extend_from_slice(right.as_bytes());
                    sha256(&data)
                }
                [last] => sha256(last.as_bytes()),
                _ => unreachable!(),
            };
            next.push(combined);
        }
        level = next;
    }
    level[0]
}

/// Proof-of-work hash: SHA-256 over the preimage followed by the
/// little-endian nonce.
pub fn pow_hash(preimage: &[u8], nonce: u64) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(preimage);
    hasher.update(nonce.to_le_bytes());
    Hash(hasher.finalize().into())
}

/// True iff `hash` starts with `difficulty` ASCII `'0'` (0x30) bytes.
///
/// The difficulty prefix is the textual `'0'` character compared against
/// the raw digest bytes, not binary zeros.
pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
    hash.as_bytes()
        .iter()
        .take(difficulty as usize)
        .all(|&b| b == b'0')
}
