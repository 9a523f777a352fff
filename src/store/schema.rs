//! Store Schema
//!
//! RocksDB column families for the four logical tables (blocks,
//! transactions, UTXOs, mempool), the two secondary UTXO indexes and the
//! head-state metadata. Key layouts are fixed: primary keys big-endian so
//! iteration order is insertion/height order, index keys a 32-byte prefix
//! followed by the big-endian uid.

use crate::amount::Amount;
use crate::crypto::{Hash, PublicKey};
use crate::models::config::ChainConfig;
use crate::models::transaction::{Transaction, TxKind};
use crate::models::utxo::Utxo;
use anyhow::{anyhow, Context, Result};
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBCompressionType, Direction, IteratorMode,
    Options, WriteBatch, WriteOptions, DB,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Column family names.
pub mod cf_names {
    pub const BLOCKS: &str = "cf_blocks";
    pub const TRANSACTIONS: &str = "cf_transactions";
    pub const UTXOS: &str = "cf_utxos";
    pub const MEMPOOL: &str = "cf_mempool";
    pub const OWNER_INDEX: &str = "cf_owner_index";
    pub const PRODUCER_INDEX: &str = "cf_producer_index";
    pub const META: &str = "cf_meta";
}

/// Well-known keys in `cf_meta`.
pub mod meta_keys {
    pub const CONFIG: &[u8] = b"config";
    pub const MEMPOOL_SEQ: &[u8] = b"mempool_seq";
}

/// Store tuning knobs.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Write buffer size per column family.
    pub write_buffer_size: usize,
    /// Shared block cache size.
    pub block_cache_size: usize,
    pub max_open_files: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            write_buffer_size: 32 * 1024 * 1024,
            block_cache_size: 128 * 1024 * 1024,
            max_open_files: 512,
        }
    }
}

/// Per-family configuration.
struct CfConfig {
    name: &'static str,
    /// Bloom filters pay off for point lookups, not range scans.
    bloom_filter: bool,
}

impl CfConfig {
    const ALL: [CfConfig; 7] = [
        CfConfig { name: cf_names::BLOCKS, bloom_filter: true },
        CfConfig { name: cf_names::TRANSACTIONS, bloom_filter: true },
        CfConfig { name: cf_names::UTXOS, bloom_filter: true },
        CfConfig { name: cf_names::MEMPOOL, bloom_filter: false },
        CfConfig { name: cf_names::OWNER_INDEX, bloom_filter: false },
        CfConfig { name: cf_names::PRODUCER_INDEX, bloom_filter: false },
        CfConfig { name: cf_names::META, bloom_filter: true },
    ];

    fn to_options(&self, store: &StoreConfig, cache: &Cache) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(store.write_buffer_size);
        opts.set_compression_type(DBCompressionType::Lz4);

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_cache(cache);
        if self.bloom_filter {
            block_opts.set_bloom_filter(10.0, false);
            block_opts.set_cache_index_and_filter_blocks(true);
        }
        opts.set_block_based_table_factory(&block_opts);
        opts
    }
}

/// Handle to the node's persistent ledger store.
#[derive(Clone)]
pub struct LedgerDb {
    db: Arc<DB>,
}

impl LedgerDb {
    /// Open (or create) the store with all column families.
    pub fn open(path: &Path, config: &StoreConfig) -> Result<Self> {
        let cache = Cache::new_lru_cache(config.block_cache_size);

        let descriptors: Vec<ColumnFamilyDescriptor> = CfConfig::ALL
            .iter()
            .map(|cf| ColumnFamilyDescriptor::new(cf.name, cf.to_options(config, &cache)))
            .collect();

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(config.max_open_files);

        let db = DB::open_cf_descriptors(&db_opts, path, descriptors)
            .with_context(|| format!("failed to open ledger store at {}", path.display()))?;

        Ok(LedgerDb { db: Arc::new(db) })
    }

    pub fn handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| anyhow!("column family '{name}' not found"))
    }

    pub fn get(&self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let handle = self.handle(cf)?;
        self.db
            .get_cf(handle, key)
            .with_context(|| format!("failed to read from {cf}"))
    }

    pub fn put(&self, cf: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let handle = self.handle(cf)?;
        self.db
            .put_cf(handle, key, value)
            .with_context(|| format!("failed to write to {cf}"))
    }

    pub fn batch(&self) -> WriteBatch {
        WriteBatch::default()
    }

    /// Execute a write batch atomically and durably.
    pub fn write(&self, batch: WriteBatch) -> Result<()> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.db
            .write_opt(batch, &write_opts)
            .context("failed to execute write batch")
    }

    /// All `(key, value)` pairs whose key starts with `prefix`, in key
    /// order. An empty prefix scans the whole family.
    pub fn scan_prefix(&self, cf: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let handle = self.handle(cf)?;
        let mode = if prefix.is_empty() {
            IteratorMode::Start
        } else {
            IteratorMode::From(prefix, Direction::Forward)
        };

        let mut rows = Vec::new();
        for entry in self.db.iterator_cf(handle, mode) {
            let (key, value) = entry.with_context(|| format!("iterator error in {cf}"))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }
}

// --- key layouts ---

pub fn uid_key(uid: i64) -> [u8; 8] {
    uid.to_be_bytes()
}

pub fn height_key(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}

pub fn owner_index_key(owner: &Hash, uid: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(owner.as_bytes());
    key.extend_from_slice(&uid.to_be_bytes());
    key
}

pub fn producer_index_key(producing_tx_hash: &Hash, uid: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(producing_tx_hash.as_bytes());
    key.extend_from_slice(&uid.to_be_bytes());
    key
}

pub fn mempool_key(seq: u64, uid: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&seq.to_be_bytes());
    key.extend_from_slice(&uid.to_be_bytes());
    key
}

/// The uid suffix of a mempool key.
pub fn mempool_key_uid(key: &[u8]) -> Option<i64> {
    let suffix: [u8; 8] = key.get(8..16)?.try_into().ok()?;
    Some(i64::from_be_bytes(suffix))
}

// --- row encodings ---

/// Stored transaction row. Inputs and outputs are not duplicated here;
/// they resolve through the UTXO indexes on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxRow {
    pub kind: TxKind,
    pub sender: PublicKey,
    pub receiver: PublicKey,
    pub amount: Amount,
    pub signature: Vec<u8>,
    pub hash: Hash,
    pub block_index: i64,
}

impl TxRow {
    pub fn from_transaction(tx: &Transaction) -> Self {
        TxRow {
            kind: tx.kind,
            sender: tx.sender.clone(),
            receiver: tx.receiver.clone(),
            amount: tx.amount,
            signature: tx.signature.clone(),
            hash: tx.hash,
            block_index: tx.block_index,
        }
    }
}

/// Stored block row: header plus the config snapshot; transactions are
/// stored in their own family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRow {
    pub timestamp: u64,
    pub merkle_root: Hash,
    pub hash: Hash,
    pub nonce: u64,
    pub config: ChainConfig,
}

pub fn encode_row<T: Serialize>(row: &T) -> Result<Vec<u8>> {
    bincode::serialize(row).context("failed to encode store row")
}

pub fn decode_row<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).context("failed to decode store row")
}

/// Decode a stored UTXO row.
pub fn decode_utxo(bytes: &[u8]) -> Result<Utxo> {
    decode_row(bytes)
}
