//! Sanchain Node
//!
//! Ties the store, mempool, verifier and miner together and hosts the
//! commit engine. Submission and commit serialize on one mutex (the store
//! is single-writer); reads go straight to the store and observe either
//! all effects of a commit or none.

use crate::amount::Amount;
use crate::crypto::{Hash, PublicKey};
use crate::error::{LedgerError, Result, VerifyError};
use crate::miner::{mine, CancelToken, MineParams, MinedBlock};
use crate::models::account::Account;
use crate::models::block::Block;
use crate::models::config::ChainConfig;
use crate::models::transaction::Transaction;
use crate::models::utxo::Utxo;
use crate::store::batch::{load_config_snapshot, CommitBatch, CommitOp};
use crate::store::schema::{cf_names, decode_row, height_key, uid_key, BlockRow, TxRow};
use crate::store::{LedgerDb, Mempool, StoreConfig, UtxoSet};
use crate::uid::{UidGenerator, UID_SENTINEL};
use anyhow::anyhow;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};

/// Directory name of the ledger store under the node's data directory.
const STORE_DIR_NAME: &str = "sanchain-core";

/// A committed transaction read back from the store, outputs resolved
/// through the producer index.
#[derive(Debug)]
pub struct TransactionRecord {
    pub row: TxRow,
    pub outputs: Vec<Utxo>,
}

/// A running ledger node.
pub struct SanchainNode {
    db: LedgerDb,
    utxos: UtxoSet,
    mempool: Mempool,
    uids: UidGenerator,
    config: RwLock<ChainConfig>,
    config_path: PathBuf,
    /// Serializes reservation and commit, the store's single-writer
    /// critical section.
    write_lock: Mutex<()>,
}

impl SanchainNode {
    /// Open (or create) the node stored under `<data_root>/<node_id>`.
    ///
    /// The config document is loaded first; if the store's own head-state
    /// snapshot is ahead of the document (a crash between batch commit and
    /// document rewrite), the snapshot wins.
    pub fn open(data_root: &Path, node_id: &str) -> Result<Self> {
        let node_dir = data_root.join(node_id);
        std::fs::create_dir_all(&node_dir)
            .map_err(|e| LedgerError::Store(anyhow!("failed to create node directory: {e}")))?;
        let config_path = ChainConfig::path_for(data_root, node_id);
        let mut config = ChainConfig::load_or_default(&config_path)?;

        let db = LedgerDb::open(&node_dir.join(STORE_DIR_NAME), &StoreConfig::default())?;
        if let Some(snapshot) = load_config_snapshot(&db)? {
            if snapshot.last_block_index > config.last_block_index {
                log::warn!(
                    "config document behind store snapshot ({} < {}), using snapshot",
                    config.last_block_index,
                    snapshot.last_block_index
                );
                config = snapshot;
            }
        }
        config.save(&config_path)?;

        let utxos = UtxoSet::new(db.clone());
        let mempool = Mempool::open(db.clone(), utxos.clone())?;

        log::info!(
            "opened node '{node_id}' at height {}",
            config.last_block_index
        );

        Ok(SanchainNode {
            db,
            utxos,
            mempool,
            uids: UidGenerator::new(),
            config: RwLock::new(config),
            config_path,
            write_lock: Mutex::new(()),
        })
    }

    /// A snapshot of the current chain config.
    pub fn config(&self) -> ChainConfig {
        self.config.read().clone()
    }

    pub fn utxo_set(&self) -> &UtxoSet {
        &self.utxos
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// Submit a signed transaction, reserving its inputs.
    pub fn submit_transaction(&self, tx: &Transaction) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.mempool.submit(tx)?;
        log::debug!("accepted transaction {} into the mempool", tx.uid);
        Ok(())
    }

    /// Build and sign a transfer from `sender`, selecting unused outputs
    /// smallest-first until the amount plus fee is covered.
    pub fn build_transfer(
        &self,
        sender: &Account,
        receiver: &PublicKey,
        amount: Amount,
    ) -> Result<Transaction> {
        let config = self.config();
        let required = amount + config.fee_for(amount);

        let mut available = self.utxos.by_owner(&sender.address(), true)?;
        available.sort_by_key(|utxo| utxo.value);

        let mut selected = Vec::new();
        let mut total = Amount::ZERO;
        for utxo in available {
            total += utxo.value;
            selected.push(utxo);
            if total >= required {
                break;
            }
        }
        if total < required {
            return Err(VerifyError::InsufficientFunds {
                required: required.units(),
                available: total.units(),
            }
            .into());
        }

        let mut tx = Transaction::transfer(
            self.uids.next()?,
            sender.public_key().clone(),
            receiver.clone(),
            amount,
            selected,
        );
        tx.sign(sender);
        Ok(tx)
    }

    /// Drain the mempool and mine one block. Transactions rejected by
    /// verification are dropped: their reservations are released and
    /// their mempool rows removed before this returns.
    pub fn mine_block(
        &self,
        miner: &PublicKey,
        params: MineParams,
        cancel: &CancelToken,
    ) -> Result<MinedBlock> {
        let config = self.config();
        let candidates = self.mempool.drain(config.block_height_limit as usize)?;
        let mined = mine(
            candidates,
            miner,
            &config,
            &self.utxos,
            &self.uids,
            params,
            cancel,
        )?;

        for rejected in &mined.dropped {
            self.release_inputs(&rejected.tx)?;
            self.mempool.remove(rejected.tx.uid)?;
        }

        Ok(mined)
    }

    /// Commit engine: apply `block` to the canonical store in one durable
    /// unit — block row, transaction rows, spent-input deletes, nascent
    /// output inserts, head-state advance and mempool removals all land
    /// together or not at all.
    pub fn commit_block(&self, block: &Block, cancel: &CancelToken) -> Result<()> {
        let _guard = self.write_lock.lock();
        if cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }

        let mut config = self.config();
        if block.index as i64 != config.next_block_index() {
            return Err(LedgerError::CommitFailed(anyhow!(
                "block index {} does not extend tip {}",
                block.index,
                config.last_block_index
            )));
        }
        if block.config.last_block_hash != config.last_block_hash {
            return Err(LedgerError::CommitFailed(anyhow!(
                "block {} was mined against a different parent",
                block.index
            )));
        }
        let reward = block
            .reward_transaction()
            .ok_or_else(|| LedgerError::CommitFailed(anyhow!("block carries no reward")))?;

        let mut batch = CommitBatch::new(self.db.clone());
        batch.push(CommitOp::InsertBlock {
            block: block.clone(),
        });
        for tx in &block.transactions {
            batch.push(CommitOp::InsertTransaction { tx: tx.clone() });
            for input in &tx.inputs {
                batch.push(CommitOp::DeleteUtxo {
                    utxo: input.clone(),
                });
            }
            for output in &tx.outputs {
                batch.push(CommitOp::InsertUtxo {
                    utxo: output.clone(),
                });
            }
            if !tx.is_reward() {
                batch.push(CommitOp::RemoveFromMempool { uid: tx.uid });
            }
        }

        config.advance(block.index, block.hash, reward.amount);
        batch.push(CommitOp::PutConfig {
            config: config.clone(),
        });

        batch.commit().map_err(LedgerError::CommitFailed)?;

        *self.config.write() = config.clone();
        if let Err(err) = config.save(&self.config_path) {
            // The store snapshot is authoritative; the document catches up
            // on the next successful save.
            log::error!("failed to rewrite config document: {err:#}");
        }

        log::info!(
            "committed block {} ({} transactions), circulation {}",
            block.index,
            block.transactions.len(),
            config.circulation
        );
        Ok(())
    }

    /// Release the input reservations held by `tx`, making its inputs
    /// visible to wallet queries and new submissions again.
    pub fn release_inputs(&self, tx: &Transaction) -> Result<()> {
        let _guard = self.write_lock.lock();
        for input in &tx.inputs {
            if let Some(stored) = self.utxos.get(input.uid)? {
                if stored.spender_tx_uid == tx.uid {
                    self.utxos.set_spender(input.uid, UID_SENTINEL)?;
                }
            }
        }
        Ok(())
    }

    /// Sum of the owner's unused outputs.
    pub fn balance_of(&self, owner: &Hash) -> Result<Amount> {
        Ok(self
            .utxos
            .by_owner(owner, true)?
            .into_iter()
            .map(|utxo| utxo.value)
            .sum())
    }

    /// Committed block header at `index`.
    pub fn block(&self, index: u64) -> Result<Option<BlockRow>> {
        match self.db.get(cf_names::BLOCKS, &height_key(index))? {
            Some(bytes) => Ok(Some(decode_row(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Committed transaction by uid, outputs resolved through the
    /// producer index.
    pub fn transaction(&self, uid: i64) -> Result<Option<TransactionRecord>> {
        let row: TxRow = match self.db.get(cf_names::TRANSACTIONS, &uid_key(uid))? {
            Some(bytes) => decode_row(&bytes)?,
            None => return Ok(None),
        };
        let outputs = self.utxos.by_producing_tx(&row.hash)?;
        Ok(Some(TransactionRecord { row, outputs }))
    }
}
