//! Ledger Error Taxonomy
//!
//! Verification failures are values returned from the verifier; everything
//! else surfaces through `LedgerError`.

use crate::crypto::CryptoError;

/// Reasons a transaction fails verification.
///
/// These are ordinary values, not exceptional control flow: a rejected
/// transaction is dropped from the mining pass and its reservations are
/// released, but the node keeps running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("signature does not match the signable form of the transaction")]
    InvalidSignature,

    #[error("input UTXO {uid} is unknown or does not match the stored entry")]
    UnknownInput { uid: i64 },

    #[error("insufficient funds: required {required} base units, inputs total {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("transaction amount must be positive")]
    NonPositiveAmount,

    #[error("reward transaction is malformed: {0}")]
    MalformedReward(String),
}

/// Top-level error type for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// An input UTXO is already reserved by another pending transaction.
    #[error("UTXO {utxo_uid} is already reserved by transaction {spender_tx_uid}")]
    DoubleReservation { utxo_uid: i64, spender_tx_uid: i64 },

    /// A block commit failed; the store and mempool observe no change.
    #[error("block commit failed")]
    CommitFailed(#[source] anyhow::Error),

    /// Cooperative shutdown; not an error to users.
    #[error("operation cancelled")]
    Cancelled,

    /// A record's stored hash does not match a recomputation of its
    /// canonical encoding. Fatal: signals store or wire corruption.
    #[error("encoding mismatch for {kind}: stored hash {stored} != recomputed {recomputed}")]
    EncodingMismatch {
        kind: &'static str,
        stored: String,
        recomputed: String,
    },

    /// The identifier generator observed time running backwards beyond
    /// its tolerance.
    #[error("identifier source exhausted: clock ran backwards")]
    IdExhausted,

    /// A transaction rejected by a verification rule, surfaced through an
    /// operation that refuses to accept it.
    #[error(transparent)]
    Rejected(#[from] VerifyError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("store error")]
    Store(#[source] anyhow::Error),

    #[error("codec error")]
    Codec(#[from] serde_json::Error),
}

impl From<anyhow::Error> for LedgerError {
    fn from(err: anyhow::Error) -> Self {
        LedgerError::Store(err)
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
