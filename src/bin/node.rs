//! Operator binary: open (or create) a node, then mine and commit a run
//! of blocks, draining whatever the mempool holds.
//!
//! Usage: sanchain-node <data_root> <node_id> <miner_account.json> [blocks]

use anyhow::{bail, Context, Result};
use sanchain::{Account, CancelToken, MineParams, SanchainNode};
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!("usage: sanchain-node <data_root> <node_id> <miner_account.json> [blocks]");
    }
    let data_root = PathBuf::from(&args[0]);
    let node_id = &args[1];
    let account_path = PathBuf::from(&args[2]);
    let block_target: u64 = match args.get(3) {
        Some(raw) => raw.parse().context("block count must be an integer")?,
        None => 10,
    };

    let miner = if account_path.exists() {
        Account::load(&account_path)?
    } else {
        let account = Account::generate();
        account.save(&account_path)?;
        log::info!("created miner account at {}", account_path.display());
        account
    };

    let node = SanchainNode::open(&data_root, node_id)?;
    let cancel = CancelToken::new();

    for _ in 0..block_target {
        let mined = node.mine_block(miner.public_key(), MineParams::default(), &cancel)?;
        if !mined.dropped.is_empty() {
            log::warn!("dropped {} invalid transaction(s)", mined.dropped.len());
        }
        node.commit_block(&mined.block, &cancel)?;

        println!(
            "block {} committed: hash {}, {} transaction(s), miner balance {}",
            mined.block.index,
            mined.block.hash,
            mined.block.transactions.len(),
            node.balance_of(&miner.address())?
        );
    }

    Ok(())
}
