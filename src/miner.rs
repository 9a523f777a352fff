//! Block Miner
//!
//! Assembles a candidate block from drained mempool transactions —
//! verifying and executing each one, appending the reward — then searches
//! for a nonce whose hash clears the difficulty target. The proof-of-work
//! loop is CPU-bound and checks a cancellation token between attempts.

use crate::crypto::{Hash, PublicKey};
use crate::error::{LedgerError, VerifyError};
use crate::models::block::{meets_difficulty, merkle_root, Block};
use crate::models::config::ChainConfig;
use crate::models::transaction::{ExecutedTransaction, Transaction};
use crate::store::utxo_set::UtxoSet;
use crate::uid::{now_secs, UidSource};
use crate::verify::{verify, RejectedTransaction, Verdict};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Upper bound (exclusive) of the random starting nonce.
const NONCE_START_RANGE: u64 = 100_000_000_000_000_000;

/// Cooperative cancellation flag shared between the mining loop and its
/// controller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Deterministic overrides for mining; defaults use the clock and a
/// random nonce start.
#[derive(Debug, Clone, Default)]
pub struct MineParams {
    pub timestamp: Option<u64>,
    pub nonce_seed: Option<u64>,
}

/// Result of one mining pass.
#[derive(Debug)]
pub struct MinedBlock {
    pub block: Block,
    /// Transactions rejected by verification; the caller releases their
    /// reservations and removes their mempool rows.
    pub dropped: Vec<RejectedTransaction>,
    /// Transactions skipped because the block's input budget ran out;
    /// they stay pending for a later block.
    pub deferred: Vec<Transaction>,
}

/// Mine one block from `candidates` against a config snapshot.
pub fn mine(
    candidates: Vec<Transaction>,
    miner: &PublicKey,
    config: &ChainConfig,
    utxos: &UtxoSet,
    uids: &dyn UidSource,
    params: MineParams,
    cancel: &CancelToken,
) -> Result<MinedBlock, LedgerError> {
    let timestamp = params.timestamp.unwrap_or_else(now_secs);

    let mut executed: Vec<ExecutedTransaction> = Vec::new();
    let mut dropped = Vec::new();
    let mut deferred = Vec::new();
    let mut inputs_used = 0usize;

    for tx in candidates {
        // Rewards are minted by the miner itself, never drawn from the
        // mempool.
        if tx.is_reward() {
            dropped.push(RejectedTransaction {
                tx,
                reason: VerifyError::MalformedReward(
                    "rewards are emitted by the miner, not submitted".into(),
                ),
            });
            continue;
        }
        if inputs_used + tx.inputs.len() > config.block_utxo_usage_limit as usize {
            deferred.push(tx);
            continue;
        }
        match verify(tx, config, utxos).map_err(LedgerError::Store)? {
            Verdict::Verified(verified) => {
                inputs_used += verified.get().inputs.len();
                executed.push(ExecutedTransaction::execute(verified, miner, config, uids)?);
            }
            Verdict::Rejected(rejected) => {
                log::warn!(
                    "dropping transaction {} from candidate block: {}",
                    rejected.tx.uid,
                    rejected.reason
                );
                dropped.push(rejected);
            }
        }
    }

    executed.push(ExecutedTransaction::reward(miner, config, uids)?);

    let hashes: Vec<Hash> = executed.iter().map(ExecutedTransaction::hash).collect();
    let transactions: Vec<Transaction> =
        executed.into_iter().map(ExecutedTransaction::into_inner).collect();

    let mut block = Block {
        index: config.next_block_index() as u64,
        timestamp,
        merkle_root: merkle_root(&hashes),
        hash: Hash::EMPTY,
        nonce: 0,
        transactions,
        config: config.clone(),
    };

    let (hash, nonce) = search_nonce(
        &block.pow_preimage_bytes(),
        config.difficulty,
        params.nonce_seed,
        cancel,
    )?;
    block.hash = hash;
    block.nonce = nonce;

    log::info!(
        "mined block {} with {} transaction(s), nonce {}, hash {}",
        block.index,
        block.transactions.len(),
        block.nonce,
        block.hash
    );

    Ok(MinedBlock {
        block,
        dropped,
        deferred,
    })
}

/// Increment the nonce from a random start until the hash clears the
/// difficulty target. The preimage digest state is reused across
/// attempts; only the eight nonce bytes are rehashed per try.
fn search_nonce(
    preimage: &[u8],
    difficulty: u32,
    seed: Option<u64>,
    cancel: &CancelToken,
) -> Result<(Hash, u64), LedgerError> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut nonce: u64 = rng.gen_range(0..NONCE_START_RANGE);

    let mut base = Sha256::new();
    base.update(preimage);

    loop {
        if cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }
        nonce += 1;

        let mut hasher = base.clone();
        hasher.update(nonce.to_le_bytes());
        let hash = Hash(hasher.finalize().into());

        if meets_difficulty(&hash, difficulty) {
            return Ok((hash, nonce));
        }
    }
}
