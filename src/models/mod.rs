//! Ledger Data Model
//!
//! Records and their canonical encodings: UTXOs, transactions, blocks,
//! the chain config and account documents.

pub mod account;
pub mod block;
pub mod config;
pub mod transaction;
pub mod utxo;

pub use account::{is_reward_sender, reward_sender, Account};
pub use block::{merkle_root, meets_difficulty, pow_hash, Block};
pub use config::{ChainConfig, ConfigTag, CONFIG_FILE_NAME};
pub use transaction::{ExecutedTransaction, Transaction, TxKind, VerifiedTransaction};
pub use utxo::Utxo;
