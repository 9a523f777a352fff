//! Wire Messages
//!
//! JSON text frames for the broadcast fan-out, tagged by a mandatory
//! `type` field. Transactions and configs already carry their tag;
//! blocks, UTXOs and account announcements get a thin envelope. Decoding
//! recomputes seal hashes where a frame carries one — a mismatch is
//! corruption, not a malformed message.

use crate::crypto::PublicKey;
use crate::error::{LedgerError, Result};
use crate::models::block::Block;
use crate::models::config::ChainConfig;
use crate::models::transaction::Transaction;
use crate::models::utxo::Utxo;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};

/// A decoded broadcast frame.
#[derive(Debug, PartialEq)]
pub enum Message {
    /// A transfer or block reward (`type` distinguishes them).
    Transaction(Transaction),
    Block(Block),
    Config(ChainConfig),
    Utxo(Utxo),
    /// A node announcing its public key.
    Account(PublicKey),
}

#[derive(Serialize, Deserialize)]
enum BlockTag {
    Block,
}

#[derive(Serialize, Deserialize)]
enum UtxoTag {
    #[serde(rename = "UTXO")]
    Utxo,
}

#[derive(Serialize, Deserialize)]
enum AccountTag {
    Account,
}

#[derive(Serialize, Deserialize)]
struct BlockFrame {
    #[serde(rename = "type")]
    tag: BlockTag,
    #[serde(flatten)]
    block: Block,
}

#[derive(Serialize, Deserialize)]
struct UtxoFrame {
    #[serde(rename = "type")]
    tag: UtxoTag,
    #[serde(flatten)]
    utxo: Utxo,
}

#[derive(Serialize, Deserialize)]
struct AccountFrame {
    #[serde(rename = "type")]
    tag: AccountTag,
    public_key: PublicKey,
}

impl Message {
    /// Encode to a JSON text frame.
    pub fn encode(&self) -> String {
        match self {
            Message::Transaction(tx) => serde_json::to_string(tx),
            Message::Block(block) => serde_json::to_string(&BlockFrame {
                tag: BlockTag::Block,
                block: block.clone(),
            }),
            Message::Config(config) => serde_json::to_string(config),
            Message::Utxo(utxo) => serde_json::to_string(&UtxoFrame {
                tag: UtxoTag::Utxo,
                utxo: utxo.clone(),
            }),
            Message::Account(public_key) => serde_json::to_string(&AccountFrame {
                tag: AccountTag::Account,
                public_key: public_key.clone(),
            }),
        }
        .expect("wire frames serialize infallibly")
    }

    /// Decode a JSON text frame, checking carried seal hashes.
    pub fn decode(text: &str) -> Result<Message> {
        let probe: serde_json::Value = serde_json::from_str(text)?;
        let kind = probe
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| serde_json::Error::custom("frame is missing its type field"))?;

        match kind {
            "Transaction" | "BlockReward" => {
                let tx: Transaction = serde_json::from_str(text)?;
                if !tx.hash.is_empty() {
                    tx.check_integrity()?;
                }
                Ok(Message::Transaction(tx))
            }
            "Block" => {
                let frame: BlockFrame = serde_json::from_str(text)?;
                frame.block.check_integrity()?;
                Ok(Message::Block(frame.block))
            }
            "SanchainConfig" => Ok(Message::Config(serde_json::from_str(text)?)),
            "UTXO" => {
                let frame: UtxoFrame = serde_json::from_str(text)?;
                Ok(Message::Utxo(frame.utxo))
            }
            "Account" => {
                let frame: AccountFrame = serde_json::from_str(text)?;
                Ok(Message::Account(frame.public_key))
            }
            other => Err(LedgerError::Codec(serde_json::Error::custom(format!(
                "unknown message type '{other}'"
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::crypto::sha256;
    use crate::miner::{mine, CancelToken, MineParams};
    use crate::models::account::Account;
    use crate::store::schema::{LedgerDb, StoreConfig};
    use crate::store::UtxoSet;
    use crate::uid::{UidGenerator, UID_SENTINEL};

    fn mined_block() -> Block {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(dir.path(), &StoreConfig::default()).unwrap();
        let utxos = UtxoSet::new(db);
        let miner = Account::generate();
        let config = ChainConfig {
            difficulty: 1,
            ..ChainConfig::default()
        };
        let uids = UidGenerator::new();
        mine(
            Vec::new(),
            miner.public_key(),
            &config,
            &utxos,
            &uids,
            MineParams::default(),
            &CancelToken::new(),
        )
        .unwrap()
        .block
    }

    #[test]
    fn test_transaction_frame_roundtrip() {
        let sender = Account::generate();
        let receiver = Account::generate();
        let mut tx = Transaction::transfer(
            7007,
            sender.public_key().clone(),
            receiver.public_key().clone(),
            Amount::from_san(3),
            Vec::new(),
        );
        tx.sign(&sender);

        let frame = Message::Transaction(tx).encode();
        assert!(frame.starts_with(r#"{"type":"Transaction""#));
        let decoded = Message::decode(&frame).unwrap();
        assert!(matches!(decoded, Message::Transaction(ref t) if t.uid == 7007));
    }

    #[test]
    fn test_block_frame_roundtrip() {
        let block = mined_block();
        let frame = Message::Block(block.clone()).encode();
        assert!(frame.starts_with(r#"{"type":"Block""#));
        let decoded = Message::decode(&frame).unwrap();
        assert_eq!(decoded, Message::Block(block));
    }

    #[test]
    fn test_tampered_block_frame_is_corruption() {
        let mut block = mined_block();
        block.timestamp += 1;
        let frame = Message::Block(block).encode();
        let err = Message::decode(&frame).unwrap_err();
        assert!(matches!(err, LedgerError::EncodingMismatch { .. }));
    }

    #[test]
    fn test_config_frame_roundtrip() {
        let config = ChainConfig::default();
        let frame = Message::Config(config.clone()).encode();
        assert_eq!(Message::decode(&frame).unwrap(), Message::Config(config));
    }

    #[test]
    fn test_utxo_frame_roundtrip() {
        let utxo = Utxo {
            uid: 5,
            owner: sha256(b"owner"),
            value: Amount::from_san(1),
            index: 0,
            producing_tx_hash: sha256(b"tx"),
            block_index: 0,
            spender_tx_uid: UID_SENTINEL,
        };
        let frame = Message::Utxo(utxo.clone()).encode();
        assert!(frame.starts_with(r#"{"type":"UTXO""#));
        assert_eq!(Message::decode(&frame).unwrap(), Message::Utxo(utxo));
    }

    #[test]
    fn test_account_frame_roundtrip() {
        let account = Account::generate();
        let frame = Message::Account(account.public_key().clone()).encode();
        let decoded = Message::decode(&frame).unwrap();
        assert_eq!(decoded, Message::Account(account.public_key().clone()));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = Message::decode(r#"{"type":"Gossip"}"#).unwrap_err();
        assert!(matches!(err, LedgerError::Codec(_)));
        assert!(Message::decode(r#"{"uid":1}"#).is_err());
    }
}
