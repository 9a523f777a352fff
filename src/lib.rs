//! Sanchain — a small UTXO-model blockchain node.
//!
//! The core is the ledger engine: a RocksDB-backed store of blocks,
//! transactions and unspent outputs, a mempool with input reservation, a
//! transaction verifier, a proof-of-work block miner and an atomic commit
//! engine, all sharing one canonical byte encoding for signing and
//! hashing.

pub mod amount;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod miner;
pub mod models;
pub mod node;
pub mod store;
pub mod uid;
pub mod verify;
pub mod wire;

pub use amount::Amount;
pub use crypto::{sha256, Hash, Keypair, PublicKey};
pub use error::{LedgerError, VerifyError};
pub use miner::{CancelToken, MineParams, MinedBlock};
pub use models::{
    is_reward_sender, reward_sender, Account, Block, ChainConfig, ExecutedTransaction,
    Transaction, TxKind, Utxo, VerifiedTransaction,
};
pub use node::{SanchainNode, TransactionRecord};
pub use store::{LedgerDb, Mempool, StoreConfig, UtxoSet};
pub use uid::{UidGenerator, UidSource, UID_SENTINEL};
pub use verify::{verify, RejectedTransaction, Verdict};
pub use wire::Message;
