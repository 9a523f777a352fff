//! Chain Parameters and Head State
//!
//! The config carries both the protocol parameters and the tip metadata
//! (`last_block_index`, `last_block_hash`, `circulation`). It is loaded on
//! startup from a per-node JSON document, snapshotted into every mined
//! block, and advanced atomically with each commit. Nothing mutates a
//! snapshot in place; only the commit engine writes a new one.

use crate::amount::Amount;
use crate::crypto::Hash;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the per-node config document.
pub const CONFIG_FILE_NAME: &str = ".Sanchain-config.json";

/// Constant `type` tag carried by every config encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConfigTag {
    #[default]
    SanchainConfig,
}

/// Chain parameters plus tip metadata.
///
/// Field declaration order is the canonical encoding key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(rename = "type")]
    pub tag: ConfigTag,
    pub version: u32,
    /// Number of leading ASCII `'0'` (0x30) bytes required on a block
    /// hash.
    pub difficulty: u32,
    pub reward: Amount,
    /// Cap on input UTXOs consumed per block.
    pub block_utxo_usage_limit: u32,
    /// Miner fee as basis points of the transfer amount.
    pub miner_fee_bps: u64,
    /// Cap on transactions pulled from the mempool per block.
    pub block_height_limit: u32,
    pub last_block_index: i64,
    pub last_block_hash: Hash,
    pub circulation: Amount,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            tag: ConfigTag::SanchainConfig,
            version: 1,
            difficulty: 3,
            reward: Amount::from_san(100),
            block_utxo_usage_limit: 1000,
            miner_fee_bps: 100,
            block_height_limit: 100,
            last_block_index: -1,
            last_block_hash: Hash::EMPTY,
            circulation: Amount::ZERO,
        }
    }
}

impl ChainConfig {
    /// Miner fee owed on `amount` under this config.
    pub fn fee_for(&self, amount: Amount) -> Amount {
        amount.fee(self.miner_fee_bps)
    }

    /// Height of the next block to be mined.
    pub fn next_block_index(&self) -> i64 {
        self.last_block_index + 1
    }

    /// Advance the tip metadata for a freshly committed block.
    pub fn advance(&mut self, block_index: u64, block_hash: Hash, reward: Amount) {
        self.last_block_index = block_index as i64;
        self.last_block_hash = block_hash;
        self.circulation += reward;
    }

    /// Path of the config document for `node_id` under `data_root`.
    pub fn path_for(data_root: &Path, node_id: &str) -> PathBuf {
        data_root.join(node_id).join(CONFIG_FILE_NAME)
    }

    /// Load the config document, falling back to defaults when absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(ChainConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("malformed config at {}", path.display()))
    }

    /// Rewrite the config document.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string(self).expect("config serializes infallibly");
        std::fs::write(path, text)
            .with_context(|| format!("failed to write config at {}", path.display()))
    }
}
