//! Mempool
//!
//! Append-indexed store of pending transactions. Submission reserves the
//! transaction's inputs by stamping their spender field in the UTXO set —
//! reservation and row insert land in one batch, which is what keeps two
//! pending transactions from spending the same output.

use crate::error::{LedgerError, Result as LedgerResult, VerifyError};
use crate::models::transaction::Transaction;
use crate::store::schema::{
    cf_names, decode_row, encode_row, mempool_key, mempool_key_uid, meta_keys, LedgerDb,
};
use crate::store::utxo_set::UtxoSet;
use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};

/// Pending-transaction store over `cf_mempool`, keyed by insertion
/// sequence so drains replay submission order.
pub struct Mempool {
    db: LedgerDb,
    utxos: UtxoSet,
    next_seq: AtomicU64,
}

impl Mempool {
    /// Open the mempool, restoring the insertion sequence counter.
    pub fn open(db: LedgerDb, utxos: UtxoSet) -> Result<Self> {
        let next_seq = match db.get(cf_names::META, meta_keys::MEMPOOL_SEQ)? {
            Some(bytes) => {
                let bytes: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| anyhow!("malformed mempool sequence counter"))?;
                u64::from_be_bytes(bytes)
            }
            None => 0,
        };
        Ok(Mempool {
            db,
            utxos,
            next_seq: AtomicU64::new(next_seq),
        })
    }

    /// Submit a pending transaction, reserving all of its inputs.
    ///
    /// Fails with `DoubleReservation` if any input already carries a
    /// non-sentinel spender, and with `UnknownInput` if an input has no
    /// row at all. Value checks are deliberately absent here: an
    /// underfunded transaction is accepted and dropped later by the
    /// mining pass.
    pub fn submit(&self, tx: &Transaction) -> LedgerResult<()> {
        let mut batch = self.db.batch();

        for input in &tx.inputs {
            let stored = self
                .utxos
                .get(input.uid)
                .map_err(LedgerError::Store)?
                .ok_or(VerifyError::UnknownInput { uid: input.uid })?;
            if !stored.is_unspent() {
                return Err(LedgerError::DoubleReservation {
                    utxo_uid: input.uid,
                    spender_tx_uid: stored.spender_tx_uid,
                });
            }
            self.utxos
                .set_spender_in_batch(&mut batch, input.uid, tx.uid)
                .map_err(LedgerError::Store)?;
        }

        let seq = self.next_seq.fetch_add(1, Ordering::AcqRel);
        let row = encode_row(tx).map_err(LedgerError::Store)?;
        batch.put_cf(
            self.db.handle(cf_names::MEMPOOL).map_err(LedgerError::Store)?,
            mempool_key(seq, tx.uid),
            row,
        );
        batch.put_cf(
            self.db.handle(cf_names::META).map_err(LedgerError::Store)?,
            meta_keys::MEMPOOL_SEQ,
            (seq + 1).to_be_bytes(),
        );

        self.db.write(batch).map_err(LedgerError::Store)
    }

    /// Up to `limit` pending transactions in insertion order. Read-only:
    /// rows stay in place until they commit or are dropped.
    pub fn drain(&self, limit: usize) -> Result<Vec<Transaction>> {
        let mut txs = Vec::new();
        for (_, value) in self.db.scan_prefix(cf_names::MEMPOOL, &[])? {
            if txs.len() >= limit {
                break;
            }
            txs.push(decode_row(&value).context("malformed mempool row")?);
        }
        Ok(txs)
    }

    /// Erase the row for `uid`. Does not release input reservations;
    /// dropped transactions go through the commit engine's
    /// `release_inputs` first.
    pub fn remove(&self, uid: i64) -> Result<()> {
        let mut batch = self.db.batch();
        self.remove_in_batch(&mut batch, uid)?;
        self.db.write(batch)
    }

    pub(crate) fn remove_in_batch(&self, batch: &mut rocksdb::WriteBatch, uid: i64) -> Result<()> {
        for (key, _) in self.db.scan_prefix(cf_names::MEMPOOL, &[])? {
            if mempool_key_uid(&key) == Some(uid) {
                batch.delete_cf(self.db.handle(cf_names::MEMPOOL)?, key);
                return Ok(());
            }
        }
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.db.scan_prefix(cf_names::MEMPOOL, &[])?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::crypto::sha256;
    use crate::models::account::Account;
    use crate::models::utxo::Utxo;
    use crate::store::schema::StoreConfig;
    use crate::uid::UID_SENTINEL;

    fn open_pool() -> (tempfile::TempDir, UtxoSet, Mempool) {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(dir.path(), &StoreConfig::default()).unwrap();
        let utxos = UtxoSet::new(db.clone());
        let mempool = Mempool::open(db, utxos.clone()).unwrap();
        (dir, utxos, mempool)
    }

    fn funded_transfer(utxos: &UtxoSet, tx_uid: i64, input_uid: i64) -> Transaction {
        let sender = Account::generate();
        let receiver = Account::generate();
        let input = Utxo {
            uid: input_uid,
            owner: sender.address(),
            value: Amount::from_san(50),
            index: 0,
            producing_tx_hash: sha256(b"producer"),
            block_index: 0,
            spender_tx_uid: UID_SENTINEL,
        };
        utxos.insert(&input).unwrap();
        let mut tx = Transaction::transfer(
            tx_uid,
            sender.public_key().clone(),
            receiver.public_key().clone(),
            Amount::from_san(10),
            vec![input],
        );
        tx.sign(&sender);
        tx
    }

    #[test]
    fn test_submit_reserves_inputs() {
        let (_dir, utxos, mempool) = open_pool();
        let tx = funded_transfer(&utxos, 500, 10);

        mempool.submit(&tx).unwrap();

        assert_eq!(mempool.len().unwrap(), 1);
        assert_eq!(utxos.get(10).unwrap().unwrap().spender_tx_uid, 500);
        // Reserved outputs disappear from wallet queries but keep their row.
        assert!(utxos
            .by_owner(&tx.inputs[0].owner, true)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_double_reservation_rejected() {
        let (_dir, utxos, mempool) = open_pool();
        let tx = funded_transfer(&utxos, 500, 10);
        mempool.submit(&tx).unwrap();

        let mut second = tx.clone();
        second.uid = 501;
        let err = mempool.submit(&second).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::DoubleReservation {
                utxo_uid: 10,
                spender_tx_uid: 500
            }
        ));
        assert_eq!(mempool.len().unwrap(), 1);
    }

    #[test]
    fn test_unknown_input_rejected() {
        let (_dir, utxos, mempool) = open_pool();
        let mut tx = funded_transfer(&utxos, 500, 10);
        tx.inputs[0].uid = 777;

        let err = mempool.submit(&tx).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Rejected(VerifyError::UnknownInput { uid: 777 })
        ));
        // The real input stays unreserved.
        assert!(utxos.get(10).unwrap().unwrap().is_unspent());
    }

    #[test]
    fn test_drain_preserves_insertion_order() {
        let (_dir, utxos, mempool) = open_pool();
        let first = funded_transfer(&utxos, 900, 10);
        let second = funded_transfer(&utxos, 300, 11);
        let third = funded_transfer(&utxos, 600, 12);
        mempool.submit(&first).unwrap();
        mempool.submit(&second).unwrap();
        mempool.submit(&third).unwrap();

        let drained = mempool.drain(2).unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].uid, 900);
        assert_eq!(drained[1].uid, 300);

        let all = mempool.drain(10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].uid, 600);
    }

    #[test]
    fn test_remove_leaves_reservation() {
        let (_dir, utxos, mempool) = open_pool();
        let tx = funded_transfer(&utxos, 500, 10);
        mempool.submit(&tx).unwrap();

        mempool.remove(500).unwrap();
        assert!(mempool.is_empty().unwrap());
        // Reservation release is the commit engine's job.
        assert_eq!(utxos.get(10).unwrap().unwrap().spender_tx_uid, 500);
    }

    #[test]
    fn test_sequence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = LedgerDb::open(dir.path(), &StoreConfig::default()).unwrap();
            let utxos = UtxoSet::new(db.clone());
            let mempool = Mempool::open(db, utxos.clone()).unwrap();
            let tx = funded_transfer(&utxos, 500, 10);
            mempool.submit(&tx).unwrap();
        }
        let db = LedgerDb::open(dir.path(), &StoreConfig::default()).unwrap();
        let utxos = UtxoSet::new(db.clone());
        let mempool = Mempool::open(db, utxos).unwrap();
        assert_eq!(mempool.next_seq.load(Ordering::Acquire), 1);
        assert_eq!(mempool.drain(10).unwrap().len(), 1);
    }
}
