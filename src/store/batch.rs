//! Commit Batch
//!
//! All multi-row state transitions (block commits, reservation releases)
//! are expressed as operation lists executed in one durable RocksDB write
//! batch with a fixed phase order. Either every operation lands or none
//! does.

use crate::models::block::Block;
use crate::models::config::ChainConfig;
use crate::models::transaction::Transaction;
use crate::models::utxo::Utxo;
use crate::store::schema::{
    cf_names, encode_row, height_key, mempool_key_uid, meta_keys, uid_key, BlockRow, LedgerDb,
    TxRow,
};
use crate::store::utxo_set::UtxoSet;
use anyhow::{Context, Result};

/// One step of an atomic state transition.
#[derive(Debug, Clone)]
pub enum CommitOp {
    /// Insert the block header row.
    InsertBlock { block: Block },

    /// Insert a committed transaction row.
    InsertTransaction { tx: Transaction },

    /// Retire a spent input row (and its index entries).
    DeleteUtxo { utxo: Utxo },

    /// Insert a nascent output row (and its index entries).
    InsertUtxo { utxo: Utxo },

    /// Rewrite the reservation field of an existing UTXO row.
    SetSpender { uid: i64, spender_tx_uid: i64 },

    /// Persist the advanced head state.
    PutConfig { config: ChainConfig },

    /// Remove a processed transaction from the mempool.
    RemoveFromMempool { uid: i64 },
}

/// Ordered batch builder.
///
/// Execution order is fixed — blocks, transactions, UTXO deletes, UTXO
/// inserts, spender updates, head state, mempool removals — so a commit
/// never observes its own partial effects regardless of the order the
/// caller queued operations in.
pub struct CommitBatch {
    db: LedgerDb,
    utxos: UtxoSet,
    ops: Vec<CommitOp>,
}

impl CommitBatch {
    pub fn new(db: LedgerDb) -> Self {
        let utxos = UtxoSet::new(db.clone());
        CommitBatch {
            db,
            utxos,
            ops: Vec::new(),
        }
    }

    pub fn push(&mut self, op: CommitOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Execute all queued operations in one durable write.
    pub fn commit(self) -> Result<()> {
        if self.ops.is_empty() {
            return Ok(());
        }

        let mut batch = self.db.batch();

        // Phase 1: block header rows.
        for op in &self.ops {
            if let CommitOp::InsertBlock { block } = op {
                let row = BlockRow {
                    timestamp: block.timestamp,
                    merkle_root: block.merkle_root,
                    hash: block.hash,
                    nonce: block.nonce,
                    config: block.config.clone(),
                };
                batch.put_cf(
                    self.db.handle(cf_names::BLOCKS)?,
                    height_key(block.index),
                    encode_row(&row)?,
                );
            }
        }

        // Phase 2: committed transaction rows.
        for op in &self.ops {
            if let CommitOp::InsertTransaction { tx } = op {
                batch.put_cf(
                    self.db.handle(cf_names::TRANSACTIONS)?,
                    uid_key(tx.uid),
                    encode_row(&TxRow::from_transaction(tx))?,
                );
            }
        }

        // Phase 3: retire spent inputs.
        for op in &self.ops {
            if let CommitOp::DeleteUtxo { utxo } = op {
                self.utxos.delete_in_batch(&mut batch, utxo)?;
            }
        }

        // Phase 4: insert nascent outputs.
        for op in &self.ops {
            if let CommitOp::InsertUtxo { utxo } = op {
                self.utxos.insert_in_batch(&mut batch, utxo)?;
            }
        }

        // Phase 5: reservation updates.
        for op in &self.ops {
            if let CommitOp::SetSpender {
                uid,
                spender_tx_uid,
            } = op
            {
                self.utxos
                    .set_spender_in_batch(&mut batch, *uid, *spender_tx_uid)?;
            }
        }

        // Phase 6: head state.
        for op in &self.ops {
            if let CommitOp::PutConfig { config } = op {
                let snapshot =
                    serde_json::to_vec(config).context("failed to encode config snapshot")?;
                batch.put_cf(self.db.handle(cf_names::META)?, meta_keys::CONFIG, snapshot);
            }
        }

        // Phase 7: mempool removals.
        for op in &self.ops {
            if let CommitOp::RemoveFromMempool { uid } = op {
                for (key, _) in self.db.scan_prefix(cf_names::MEMPOOL, &[])? {
                    if mempool_key_uid(&key) == Some(*uid) {
                        batch.delete_cf(self.db.handle(cf_names::MEMPOOL)?, key);
                        break;
                    }
                }
            }
        }

        self.db.write(batch)
    }
}

/// Load the head state persisted by the last commit, if any.
pub fn load_config_snapshot(db: &LedgerDb) -> Result<Option<ChainConfig>> {
    match db.get(cf_names::META, meta_keys::CONFIG)? {
        Some(bytes) => {
            let config =
                serde_json::from_slice(&bytes).context("malformed config snapshot in store")?;
            Ok(Some(config))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::crypto::sha256;
    use crate::store::schema::StoreConfig;
    use crate::uid::UID_SENTINEL;

    #[test]
    fn test_empty_batch_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(dir.path(), &StoreConfig::default()).unwrap();
        CommitBatch::new(db).commit().unwrap();
    }

    #[test]
    fn test_delete_and_insert_land_together() {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(dir.path(), &StoreConfig::default()).unwrap();
        let utxos = UtxoSet::new(db.clone());

        let owner = sha256(b"owner");
        let spent = Utxo {
            uid: 1,
            owner,
            value: Amount::from_san(5),
            index: 0,
            producing_tx_hash: sha256(b"old"),
            block_index: 0,
            spender_tx_uid: 42,
        };
        utxos.insert(&spent).unwrap();

        let mut fresh = spent.clone();
        fresh.uid = 2;
        fresh.producing_tx_hash = sha256(b"new");
        fresh.spender_tx_uid = UID_SENTINEL;

        let mut batch = CommitBatch::new(db.clone());
        batch.push(CommitOp::DeleteUtxo { utxo: spent });
        batch.push(CommitOp::InsertUtxo { utxo: fresh });
        batch.commit().unwrap();

        assert!(utxos.get(1).unwrap().is_none());
        assert!(utxos.get(2).unwrap().is_some());
        assert_eq!(utxos.by_owner(&owner, false).unwrap().len(), 1);
    }

    #[test]
    fn test_config_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(dir.path(), &StoreConfig::default()).unwrap();
        assert!(load_config_snapshot(&db).unwrap().is_none());

        let mut config = ChainConfig::default();
        config.advance(3, sha256(b"tip"), config.reward);

        let mut batch = CommitBatch::new(db.clone());
        batch.push(CommitOp::PutConfig {
            config: config.clone(),
        });
        batch.commit().unwrap();

        assert_eq!(load_config_snapshot(&db).unwrap(), Some(config));
    }
}
