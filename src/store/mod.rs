//! Persistent Ledger Store
//!
//! RocksDB-backed tables for blocks, transactions, UTXOs and the mempool,
//! plus the atomic commit batch that ties multi-row transitions together.

pub mod batch;
pub mod mempool;
pub mod schema;
pub mod utxo_set;

pub use batch::{load_config_snapshot, CommitBatch, CommitOp};
pub use mempool::Mempool;
pub use schema::{BlockRow, LedgerDb, StoreConfig, TxRow};
pub use utxo_set::UtxoSet;
