//! UTXO Set
//!
//! The indexed store of unspent outputs. Every write is one atomic batch
//! that keeps the owner and producer indexes in step with the primary
//! rows, so concurrent readers see either all effects of a write or none.

use crate::crypto::Hash;
use crate::models::utxo::Utxo;
use crate::store::schema::{
    cf_names, decode_utxo, encode_row, owner_index_key, producer_index_key, uid_key, LedgerDb,
};
use anyhow::{anyhow, Result};
use rocksdb::WriteBatch;

/// Indexed view over `cf_utxos`.
#[derive(Clone)]
pub struct UtxoSet {
    db: LedgerDb,
}

impl UtxoSet {
    pub fn new(db: LedgerDb) -> Self {
        UtxoSet { db }
    }

    pub fn get(&self, uid: i64) -> Result<Option<Utxo>> {
        match self.db.get(cf_names::UTXOS, &uid_key(uid))? {
            Some(bytes) => Ok(Some(decode_utxo(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All outputs owned by `owner`. With `unused`, only those whose
    /// spender field is still the sentinel — reserved outputs are hidden
    /// from wallet balance queries even though their rows still exist.
    pub fn by_owner(&self, owner: &Hash, unused: bool) -> Result<Vec<Utxo>> {
        let mut utxos = Vec::new();
        for (key, _) in self.db.scan_prefix(cf_names::OWNER_INDEX, owner.as_bytes())? {
            let uid = index_key_uid(&key)?;
            let utxo = self
                .get(uid)?
                .ok_or_else(|| anyhow!("owner index points at missing UTXO {uid}"))?;
            if !unused || utxo.is_unspent() {
                utxos.push(utxo);
            }
        }
        Ok(utxos)
    }

    /// All outputs created by the transaction with seal hash `hash`.
    pub fn by_producing_tx(&self, hash: &Hash) -> Result<Vec<Utxo>> {
        let mut utxos = Vec::new();
        for (key, _) in self
            .db
            .scan_prefix(cf_names::PRODUCER_INDEX, hash.as_bytes())?
        {
            let uid = index_key_uid(&key)?;
            let utxo = self
                .get(uid)?
                .ok_or_else(|| anyhow!("producer index points at missing UTXO {uid}"))?;
            utxos.push(utxo);
        }
        Ok(utxos)
    }

    pub fn insert(&self, utxo: &Utxo) -> Result<()> {
        let mut batch = self.db.batch();
        self.insert_in_batch(&mut batch, utxo)?;
        self.db.write(batch)
    }

    pub fn delete(&self, uid: i64) -> Result<()> {
        let utxo = self
            .get(uid)?
            .ok_or_else(|| anyhow!("cannot delete missing UTXO {uid}"))?;
        let mut batch = self.db.batch();
        self.delete_in_batch(&mut batch, &utxo)?;
        self.db.write(batch)
    }

    /// Rewrite the spender field of an existing row.
    pub fn set_spender(&self, uid: i64, spender_tx_uid: i64) -> Result<()> {
        let mut batch = self.db.batch();
        self.set_spender_in_batch(&mut batch, uid, spender_tx_uid)?;
        self.db.write(batch)
    }

    // Batch-building helpers shared with the commit engine.

    pub(crate) fn insert_in_batch(&self, batch: &mut WriteBatch, utxo: &Utxo) -> Result<()> {
        let row = encode_row(utxo)?;
        batch.put_cf(self.db.handle(cf_names::UTXOS)?, uid_key(utxo.uid), row);
        batch.put_cf(
            self.db.handle(cf_names::OWNER_INDEX)?,
            owner_index_key(&utxo.owner, utxo.uid),
            b"",
        );
        if !utxo.producing_tx_hash.is_empty() {
            batch.put_cf(
                self.db.handle(cf_names::PRODUCER_INDEX)?,
                producer_index_key(&utxo.producing_tx_hash, utxo.uid),
                b"",
            );
        }
        Ok(())
    }

    pub(crate) fn delete_in_batch(&self, batch: &mut WriteBatch, utxo: &Utxo) -> Result<()> {
        batch.delete_cf(self.db.handle(cf_names::UTXOS)?, uid_key(utxo.uid));
        batch.delete_cf(
            self.db.handle(cf_names::OWNER_INDEX)?,
            owner_index_key(&utxo.owner, utxo.uid),
        );
        if !utxo.producing_tx_hash.is_empty() {
            batch.delete_cf(
                self.db.handle(cf_names::PRODUCER_INDEX)?,
                producer_index_key(&utxo.producing_tx_hash, utxo.uid),
            );
        }
        Ok(())
    }

    pub(crate) fn set_spender_in_batch(
        &self,
        batch: &mut WriteBatch,
        uid: i64,
        spender_tx_uid: i64,
    ) -> Result<()> {
        let mut utxo = self
            .get(uid)?
            .ok_or_else(|| anyhow!("cannot reserve missing UTXO {uid}"))?;
        utxo.spender_tx_uid = spender_tx_uid;
        let row = encode_row(&utxo)?;
        batch.put_cf(self.db.handle(cf_names::UTXOS)?, uid_key(uid), row);
        Ok(())
    }
}

fn index_key_uid(key: &[u8]) -> Result<i64> {
    let suffix: [u8; 8] = key
        .get(32..40)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| anyhow!("malformed index key"))?;
    Ok(i64::from_be_bytes(suffix))
}
