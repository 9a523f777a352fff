//! Unspent Transaction Outputs
//!
//! A UTXO is created nascent by a transaction's execution (producing hash
//! still empty), sealed when the enclosing transaction is hashed, inserted
//! into the store on block commit and deleted again by the commit of the
//! transaction that spends it.

use crate::amount::Amount;
use crate::crypto::Hash;
use crate::uid::UID_SENTINEL;
use serde::{Deserialize, Serialize};

/// An unspent transaction output.
///
/// Field declaration order is the canonical encoding key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utxo {
    pub uid: i64,
    /// Verification key (SHA-256 of the owner's DER public key).
    pub owner: Hash,
    pub value: Amount,
    /// Position within the producing transaction's output list.
    pub index: u32,
    /// Empty until the producing transaction is sealed.
    pub producing_tx_hash: Hash,
    pub block_index: i64,
    /// `UID_SENTINEL` while unspent; otherwise the uid of the pending or
    /// committed transaction consuming this output.
    pub spender_tx_uid: i64,
}

impl Utxo {
    /// A nascent output: producing hash unset, no spender.
    pub fn nascent(uid: i64, owner: Hash, value: Amount, index: u32, block_index: i64) -> Self {
        Utxo {
            uid,
            owner,
            value,
            index,
            producing_tx_hash: Hash::EMPTY,
            block_index,
            spender_tx_uid: UID_SENTINEL,
        }
    }

    pub fn is_unspent(&self) -> bool {
        self.spender_tx_uid == UID_SENTINEL
    }

    /// Field equality with the reservation field excluded.
    ///
    /// Used by the verifier's back-trace: a submitted input legitimately
    /// differs from its stored row in `spender_tx_uid` once reserved.
    pub fn same_output(&self, other: &Utxo) -> bool {
        self.uid == other.uid
            && self.owner == other.owner
            && self.value == other.value
            && self.index == other.index
            && self.producing_tx_hash == other.producing_tx_hash
            && self.block_index == other.block_index
    }

    /// The signable view: the canonical map without the reservation field.
    pub fn signable(&self) -> SignableUtxo<'_> {
        SignableUtxo {
            uid: self.uid,
            owner: &self.owner,
            value: self.value,
            index: self.index,
            producing_tx_hash: &self.producing_tx_hash,
            block_index: self.block_index,
        }
    }
}

/// Serialize-only view of a UTXO with `spender_tx_uid` removed, embedded
/// in transaction signing preimages.
#[derive(Serialize)]
pub struct SignableUtxo<'a> {
    uid: i64,
    owner: &'a Hash,
    value: Amount,
    index: u32,
    producing_tx_hash: &'a Hash,
    block_index: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::to_canonical_vec;
    use crate::crypto::sha256;

    #[test]
    fn test_nascent_output_shape() {
        let owner = sha256(b"owner");
        let utxo = Utxo::nascent(10, owner, Amount::from_san(5), 1, 3);
        assert!(utxo.is_unspent());
        assert!(utxo.producing_tx_hash.is_empty());
        assert_eq!(utxo.index, 1);
    }

    #[test]
    fn test_same_output_ignores_spender() {
        let owner = sha256(b"owner");
        let a = Utxo::nascent(10, owner, Amount::from_san(5), 0, 3);
        let mut b = a.clone();
        b.spender_tx_uid = 99;
        assert!(a.same_output(&b));
        b.value = Amount::from_san(6);
        assert!(!a.same_output(&b));
    }

    #[test]
    fn test_signable_form_omits_spender() {
        let owner = sha256(b"owner");
        let mut utxo = Utxo::nascent(10, owner, Amount::from_san(5), 0, 3);
        utxo.spender_tx_uid = 42;

        let full = String::from_utf8(to_canonical_vec(&utxo)).unwrap();
        let signable = String::from_utf8(to_canonical_vec(&utxo.signable())).unwrap();
        assert!(full.contains("spender_tx_uid"));
        assert!(!signable.contains("spender_tx_uid"));
    }

    #[test]
    fn test_canonical_roundtrip() {
        let owner = sha256(b"owner");
        let mut utxo = Utxo::nascent(10, owner, Amount::from_san(5), 2, 3);
        utxo.producing_tx_hash = sha256(b"tx");
        let decoded: Utxo = serde_json::from_slice(&to_canonical_vec(&utxo)).unwrap();
        assert_eq!(decoded, utxo);
    }
}
