//! Transaction Verifier
//!
//! Pure checks against a config snapshot and the UTXO set; no store
//! writes. A rejection is a value carried back to the mining pass, which
//! drops the transaction and releases its reservations.

use crate::error::VerifyError;
use crate::models::account::is_reward_sender;
use crate::models::config::ChainConfig;
use crate::models::transaction::{Transaction, TxKind, VerifiedTransaction};
use crate::store::utxo_set::UtxoSet;
use anyhow::Result;

/// A transaction that failed verification, with the reason it failed.
#[derive(Debug)]
pub struct RejectedTransaction {
    pub tx: Transaction,
    pub reason: VerifyError,
}

/// Outcome of verifying one transaction.
#[derive(Debug)]
pub enum Verdict {
    Verified(VerifiedTransaction),
    Rejected(RejectedTransaction),
}

/// Verify `tx` against a config snapshot and the UTXO set.
///
/// Transfers must carry a valid signature over the signable form, inputs
/// owned by the sender that back-trace to identical store rows, and
/// enough input value to cover the amount plus the miner fee. Rewards
/// bypass signature and balance checks; instead the sender must be the
/// protocol reward identity and the sole output must pay exactly
/// `config.reward`.
///
/// The outer `Result` is for store faults only; rule failures come back
/// as `Verdict::Rejected`.
pub fn verify(tx: Transaction, config: &ChainConfig, utxos: &UtxoSet) -> Result<Verdict> {
    match tx.kind {
        TxKind::Reward => Ok(verify_reward(tx, config)),
        TxKind::Transfer => verify_transfer(tx, config, utxos),
    }
}

fn verify_reward(tx: Transaction, config: &ChainConfig) -> Verdict {
    if !is_reward_sender(&tx.sender) {
        return reject(tx, VerifyError::MalformedReward("unknown reward sender".into()));
    }
    if !tx.inputs.is_empty() {
        return reject(tx, VerifyError::MalformedReward("reward must have no inputs".into()));
    }
    if tx.outputs.len() != 1 || tx.outputs[0].value != config.reward {
        return reject(
            tx,
            VerifyError::MalformedReward("reward output must pay exactly the block reward".into()),
        );
    }
    Verdict::Verified(VerifiedTransaction::new(tx))
}

fn verify_transfer(tx: Transaction, config: &ChainConfig, utxos: &UtxoSet) -> Result<Verdict> {
    if tx.sender.verify(&tx.signable_bytes(), &tx.signature).is_err() {
        return Ok(reject(tx, VerifyError::InvalidSignature));
    }

    let sender_address = tx.sender.address();
    for input in &tx.inputs {
        if input.owner != sender_address {
            let uid = input.uid;
            return Ok(reject(tx, VerifyError::UnknownInput { uid }));
        }
    }

    // Back-trace: every input must resolve to an existing store row with
    // equal fields (the reservation field excluded).
    for input in &tx.inputs {
        let stored = utxos.get(input.uid)?;
        let matches = stored
            .as_ref()
            .map(|stored| stored.same_output(input))
            .unwrap_or(false);
        if !matches {
            let uid = input.uid;
            return Ok(reject(tx, VerifyError::UnknownInput { uid }));
        }
    }

    let required = tx.amount + config.fee_for(tx.amount);
    let available = tx.input_total();
    if available < required {
        return Ok(reject(
            tx,
            VerifyError::InsufficientFunds {
                required: required.units(),
                available: available.units(),
            },
        ));
    }

    if tx.amount.is_zero() {
        return Ok(reject(tx, VerifyError::NonPositiveAmount));
    }

    Ok(Verdict::Verified(VerifiedTransaction::new(tx)))
}

fn reject(tx: Transaction, reason: VerifyError) -> Verdict {
    Verdict::Rejected(RejectedTransaction { tx, reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::crypto::sha256;
    use crate::models::account::{reward_sender, Account};
    use crate::models::utxo::Utxo;
    use crate::store::schema::{LedgerDb, StoreConfig};
    use crate::uid::{UidGenerator, UID_SENTINEL};

    struct Fixture {
        _dir: tempfile::TempDir,
        utxos: UtxoSet,
        config: ChainConfig,
        sender: Account,
        receiver: Account,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(dir.path(), &StoreConfig::default()).unwrap();
        Fixture {
            _dir: dir,
            utxos: UtxoSet::new(db),
            config: ChainConfig::default(),
            sender: Account::generate(),
            receiver: Account::generate(),
        }
    }

    fn fund(fx: &Fixture, uid: i64, value: Amount) -> Utxo {
        let utxo = Utxo {
            uid,
            owner: fx.sender.address(),
            value,
            index: 0,
            producing_tx_hash: sha256(b"producer"),
            block_index: 0,
            spender_tx_uid: UID_SENTINEL,
        };
        fx.utxos.insert(&utxo).unwrap();
        utxo
    }

    fn signed_transfer(fx: &Fixture, amount: Amount, inputs: Vec<Utxo>) -> Transaction {
        let mut tx = Transaction::transfer(
            7001,
            fx.sender.public_key().clone(),
            fx.receiver.public_key().clone(),
            amount,
            inputs,
        );
        tx.sign(&fx.sender);
        tx
    }

    fn expect_rejection(verdict: Verdict) -> VerifyError {
        match verdict {
            Verdict::Rejected(rejected) => rejected.reason,
            Verdict::Verified(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_valid_transfer_verifies() {
        let fx = fixture();
        let input = fund(&fx, 10, Amount::from_san(50));
        let tx = signed_transfer(&fx, Amount::from_san(10), vec![input]);

        let verdict = verify(tx, &fx.config, &fx.utxos).unwrap();
        assert!(matches!(verdict, Verdict::Verified(_)));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let fx = fixture();
        let input = fund(&fx, 10, Amount::from_san(50));
        let mut tx = signed_transfer(&fx, Amount::from_san(10), vec![input]);
        tx.signature[5] ^= 0x01;

        let reason = expect_rejection(verify(tx, &fx.config, &fx.utxos).unwrap());
        assert_eq!(reason, VerifyError::InvalidSignature);
    }

    #[test]
    fn test_foreign_input_rejected() {
        let fx = fixture();
        let mut input = fund(&fx, 10, Amount::from_san(50));
        input.owner = Account::generate().address();
        // Re-sign over the altered input so the signature check passes and
        // the ownership rule is what fires.
        let tx = signed_transfer(&fx, Amount::from_san(10), vec![input]);

        let reason = expect_rejection(verify(tx, &fx.config, &fx.utxos).unwrap());
        assert_eq!(reason, VerifyError::UnknownInput { uid: 10 });
    }

    #[test]
    fn test_backtrace_mismatch_rejected() {
        let fx = fixture();
        let mut input = fund(&fx, 10, Amount::from_san(50));
        // Claim a larger value than the stored row carries.
        input.value = Amount::from_san(500);
        let tx = signed_transfer(&fx, Amount::from_san(10), vec![input]);

        let reason = expect_rejection(verify(tx, &fx.config, &fx.utxos).unwrap());
        assert_eq!(reason, VerifyError::UnknownInput { uid: 10 });
    }

    #[test]
    fn test_reserved_input_still_backtraces() {
        // Reservation mutates only the spender field, which the
        // back-trace deliberately ignores.
        let fx = fixture();
        let input = fund(&fx, 10, Amount::from_san(50));
        fx.utxos.set_spender(10, 7001).unwrap();
        let tx = signed_transfer(&fx, Amount::from_san(10), vec![input]);

        let verdict = verify(tx, &fx.config, &fx.utxos).unwrap();
        assert!(matches!(verdict, Verdict::Verified(_)));
    }

    #[test]
    fn test_insufficient_funds_rejected() {
        let fx = fixture();
        let input = fund(&fx, 10, Amount::from_san(5));
        let tx = signed_transfer(&fx, Amount::from_san(10), vec![input]);

        let reason = expect_rejection(verify(tx, &fx.config, &fx.utxos).unwrap());
        assert!(matches!(reason, VerifyError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_fee_counts_toward_required_funds() {
        // Inputs cover the amount but not amount + fee.
        let fx = fixture();
        let input = fund(&fx, 10, Amount::from_san(10));
        let tx = signed_transfer(&fx, Amount::from_san(10), vec![input]);

        let reason = expect_rejection(verify(tx, &fx.config, &fx.utxos).unwrap());
        assert!(matches!(reason, VerifyError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let fx = fixture();
        let input = fund(&fx, 10, Amount::from_san(5));
        let tx = signed_transfer(&fx, Amount::ZERO, vec![input]);

        let reason = expect_rejection(verify(tx, &fx.config, &fx.utxos).unwrap());
        assert_eq!(reason, VerifyError::NonPositiveAmount);
    }

    #[test]
    fn test_reward_verifies_by_identity_and_shape() {
        let fx = fixture();
        let miner = Account::generate();
        let uids = UidGenerator::new();
        let reward =
            crate::models::transaction::ExecutedTransaction::reward(
                miner.public_key(),
                &fx.config,
                &uids,
            )
            .unwrap();

        let verdict = verify(reward.into_inner(), &fx.config, &fx.utxos).unwrap();
        assert!(matches!(verdict, Verdict::Verified(_)));
    }

    #[test]
    fn test_forged_reward_rejected() {
        let fx = fixture();
        let miner = Account::generate();
        let uids = UidGenerator::new();
        let mut forged = crate::models::transaction::ExecutedTransaction::reward(
            miner.public_key(),
            &fx.config,
            &uids,
        )
        .unwrap()
        .into_inner();
        forged.sender = miner.public_key().clone();

        let reason = expect_rejection(verify(forged, &fx.config, &fx.utxos).unwrap());
        assert!(matches!(reason, VerifyError::MalformedReward(_)));
    }

    #[test]
    fn test_overpaying_reward_rejected() {
        let fx = fixture();
        let miner = Account::generate();
        let uids = UidGenerator::new();
        let mut reward = crate::models::transaction::ExecutedTransaction::reward(
            miner.public_key(),
            &fx.config,
            &uids,
        )
        .unwrap()
        .into_inner();
        reward.outputs[0].value = Amount::from_san(200);

        let reason = expect_rejection(verify(reward, &fx.config, &fx.utxos).unwrap());
        assert!(matches!(reason, VerifyError::MalformedReward(_)));
    }

    #[test]
    fn test_reward_sender_constant_matches() {
        assert!(is_reward_sender(reward_sender().public_key()));
    }
}
