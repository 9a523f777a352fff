//! Transactions
//!
//! A transaction is either a value transfer or a block reward, one struct
//! discriminated by its `type` tag. Verification and execution move a
//! transaction through a pipeline of value types — `Transaction` (as
//! submitted) → `VerifiedTransaction` → `ExecutedTransaction` — each stage
//! carrying strictly more information than the previous one.

use crate::amount::Amount;
use crate::canonical::{b64, to_canonical_vec};
use crate::crypto::{sha256, Hash, PublicKey};
use crate::error::LedgerError;
use crate::models::account::{reward_sender, Account};
use crate::models::config::ChainConfig;
use crate::models::utxo::{SignableUtxo, Utxo};
use crate::uid::{UidSource, UID_SENTINEL};
use serde::{Deserialize, Serialize};

/// Discriminant between value transfers and reward emissions. Serialized
/// as the wire-visible `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    #[serde(rename = "Transaction")]
    Transfer,
    #[serde(rename = "BlockReward")]
    Reward,
}

/// A signed value transfer or block reward.
///
/// Field declaration order is the canonical encoding key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub uid: i64,
    pub sender: PublicKey,
    pub receiver: PublicKey,
    pub amount: Amount,
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
    /// Existing outputs being consumed.
    pub inputs: Vec<Utxo>,
    /// Nascent outputs created on execution.
    pub outputs: Vec<Utxo>,
    /// Empty until the transaction is sealed by execution.
    pub hash: Hash,
    pub block_index: i64,
}

/// Serialize-only signing preimage: the canonical map without `signature`,
/// `outputs`, `hash` and `block_index`, inputs stripped of their
/// reservation field.
#[derive(Serialize)]
struct SignableTransaction<'a> {
    #[serde(rename = "type")]
    kind: TxKind,
    uid: i64,
    sender: &'a PublicKey,
    receiver: &'a PublicKey,
    amount: Amount,
    inputs: Vec<SignableUtxo<'a>>,
}

impl Transaction {
    /// An unsigned transfer consuming `inputs`.
    pub fn transfer(
        uid: i64,
        sender: PublicKey,
        receiver: PublicKey,
        amount: Amount,
        inputs: Vec<Utxo>,
    ) -> Self {
        Transaction {
            kind: TxKind::Transfer,
            uid,
            sender,
            receiver,
            amount,
            signature: Vec::new(),
            inputs,
            outputs: Vec::new(),
            hash: Hash::EMPTY,
            block_index: UID_SENTINEL,
        }
    }

    pub fn is_reward(&self) -> bool {
        self.kind == TxKind::Reward
    }

    /// The canonical bytes of the signing preimage.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let signable = SignableTransaction {
            kind: self.kind,
            uid: self.uid,
            sender: &self.sender,
            receiver: &self.receiver,
            amount: self.amount,
            inputs: self.inputs.iter().map(Utxo::signable).collect(),
        };
        to_canonical_vec(&signable)
    }

    /// Sign the transaction with the sender's account.
    pub fn sign(&mut self, account: &Account) {
        self.signature = account.sign(&self.signable_bytes());
    }

    /// The canonical bytes of the full record.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        to_canonical_vec(self)
    }

    /// Recompute the seal hash: the canonical encoding with the `hash`
    /// field and the outputs' producing stamps cleared, exactly as they
    /// were at sealing time.
    pub fn compute_hash(&self) -> Hash {
        let mut preimage = self.clone();
        preimage.hash = Hash::EMPTY;
        for output in &mut preimage.outputs {
            output.producing_tx_hash = Hash::EMPTY;
        }
        sha256(&preimage.canonical_bytes())
    }

    /// Check the stored seal hash against a recomputation.
    pub fn check_integrity(&self) -> Result<(), LedgerError> {
        let recomputed = self.compute_hash();
        if recomputed != self.hash {
            return Err(LedgerError::EncodingMismatch {
                kind: "transaction",
                stored: self.hash.to_base64(),
                recomputed: recomputed.to_base64(),
            });
        }
        Ok(())
    }

    pub fn input_total(&self) -> Amount {
        self.inputs.iter().map(|u| u.value).sum()
    }

    pub fn output_total(&self) -> Amount {
        self.outputs.iter().map(|u| u.value).sum()
    }
}

/// A transaction that passed verification. Only the verifier constructs
/// these; execution consumes one by value.
#[derive(Debug, Clone)]
pub struct VerifiedTransaction {
    tx: Transaction,
}

impl VerifiedTransaction {
    pub(crate) fn new(tx: Transaction) -> Self {
        VerifiedTransaction { tx }
    }

    pub fn get(&self) -> &Transaction {
        &self.tx
    }

    pub fn into_inner(self) -> Transaction {
        self.tx
    }
}

/// A verified transaction that has been executed: block index stamped,
/// nascent outputs emitted in stable order, seal hash computed.
#[derive(Debug, Clone)]
pub struct ExecutedTransaction {
    tx: Transaction,
}

impl ExecutedTransaction {
    /// Execute a verified transfer for inclusion in the next block.
    ///
    /// Outputs are emitted in signature-relevant order: the miner fee at
    /// index 0, the receiver's value at index 1 and, when the inputs
    /// exceed the amount, the sender's change (`inputs - amount`) at
    /// index 2. The fee output is minted on top of the inputs, so a
    /// transfer's outputs total `inputs + fee`.
    pub fn execute(
        verified: VerifiedTransaction,
        miner: &PublicKey,
        config: &ChainConfig,
        uids: &dyn UidSource,
    ) -> Result<Self, LedgerError> {
        let mut tx = verified.into_inner();
        tx.block_index = config.next_block_index();

        let fee = config.fee_for(tx.amount);
        let input_total = tx.input_total();

        tx.outputs = vec![
            Utxo::nascent(
                uids.next_uid()?,
                miner.address(),
                fee,
                0,
                tx.block_index,
            ),
            Utxo::nascent(
                uids.next_uid()?,
                tx.receiver.address(),
                tx.amount,
                1,
                tx.block_index,
            ),
        ];

        let change = input_total.saturating_sub(tx.amount);
        if !change.is_zero() {
            tx.outputs.push(Utxo::nascent(
                uids.next_uid()?,
                tx.sender.address(),
                change,
                2,
                tx.block_index,
            ));
        }

        Ok(Self::seal(tx))
    }

    /// Build and execute the block reward: no inputs, no fee output, a
    /// single output paying `config.reward` to the miner.
    pub fn reward(
        miner: &PublicKey,
        config: &ChainConfig,
        uids: &dyn UidSource,
    ) -> Result<Self, LedgerError> {
        let protocol = reward_sender();
        let block_index = config.next_block_index();
        let mut tx = Transaction {
            kind: TxKind::Reward,
            uid: uids.next_uid()?,
            sender: protocol.public_key().clone(),
            receiver: miner.clone(),
            amount: config.reward,
            signature: Vec::new(),
            inputs: Vec::new(),
            outputs: vec![Utxo::nascent(
                uids.next_uid()?,
                miner.address(),
                config.reward,
                0,
                block_index,
            )],
            hash: Hash::EMPTY,
            block_index,
        };
        tx.sign(protocol);
        Ok(Self::seal(tx))
    }

    /// Stamp the seal hash and propagate it into the nascent outputs.
    fn seal(mut tx: Transaction) -> Self {
        let hash = tx.compute_hash();
        tx.hash = hash;
        for output in &mut tx.outputs {
            output.producing_tx_hash = hash;
        }
        ExecutedTransaction { tx }
    }

    pub fn get(&self) -> &Transaction {
        &self.tx
    }

    pub fn hash(&self) -> Hash {
        self.tx.hash
    }

    pub fn into_inner(self) -> Transaction {
        self.tx
    }
}
