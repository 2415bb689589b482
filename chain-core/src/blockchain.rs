//! The chain itself: a sequence of blocks plus the unspent set they imply.

use serde::{Deserialize, Serialize};
use shared::{BlockchainError, Result};
use tracing::info;

use crate::block::{Block, BlockData};
use crate::difficulty::next_difficulty;
use crate::transaction::Transaction;
use crate::utxo::{update_unspent, UnspentTxOut};

/// Runtime-configurable network parameters. Unlike [`crate::constants`],
/// these may reasonably vary between deployments of the same code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub max_data_len: usize,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            max_data_len: crate::constants::BLOCKCHAIN_DATA_MAX,
        }
    }
}

/// Summary statistics over a chain, for monitoring/diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainStats {
    pub height: usize,
    pub unspent_count: usize,
    pub tip_difficulty: u32,
}

/// A blockchain: the linked blocks and the outputs they leave unspent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blockchain {
    pub chain: Vec<Block>,
    pub unspent: Vec<UnspentTxOut>,
}

impl Blockchain {
    /// A fresh chain holding only the fixed genesis block and no
    /// unspent outputs.
    #[must_use]
    pub fn create() -> Self {
        Self {
            chain: vec![Block::genesis()],
            unspent: Vec::new(),
        }
    }

    #[must_use]
    pub fn tip(&self) -> &Block {
        self.chain.last().expect("chain always has at least genesis")
    }

    /// The difficulty the next block must satisfy.
    #[must_use]
    pub fn next_difficulty(&self) -> u32 {
        next_difficulty(&self.chain)
    }

    /// Validates `block` against the current tip and unspent set, then
    /// appends it and folds its transactions into the unspent set.
    ///
    /// # Errors
    ///
    /// Propagates whatever [`Block::is_valid`] returns.
    pub fn add_block(&mut self, block: Block) -> Result<()> {
        block.is_valid(self.tip(), &self.unspent)?;

        if let Some(transactions) = &block.transactions {
            self.unspent = update_unspent(transactions, block.hash, &self.unspent);
        }
        info!(index = block.info.index, hash = %block.hash, "block appended");
        self.chain.push(block);
        Ok(())
    }

    /// Mines and appends the next block carrying `transactions` (plus a
    /// coinbase paying `miner_pub`) and an optional data payload.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::InvalidArgument`] if `data` exceeds
    /// the configured maximum length, otherwise propagates
    /// [`Block::is_valid`] failures.
    pub fn mine_next_block(
        &mut self,
        miner_pub: [u8; shared::EC_PUB_LEN],
        transactions: Vec<Transaction>,
        data: Vec<u8>,
        timestamp: u64,
    ) -> Result<&Block> {
        let next_index = self.tip().info.index + 1;
        let coinbase = Transaction::coinbase_create(miner_pub, next_index);
        let mut all_transactions = vec![coinbase];
        all_transactions.extend(transactions);

        let mut block = Block::create(
            self.tip(),
            BlockData::new(data)?,
            Some(all_transactions),
            self.next_difficulty(),
            timestamp,
        );
        block.mine();
        self.add_block(block)?;
        Ok(self.tip())
    }

    /// Returns the total value of unspent outputs owned by `pub_key`.
    #[must_use]
    pub fn balance_of(&self, pub_key: &[u8; shared::EC_PUB_LEN]) -> u64 {
        self.unspent
            .iter()
            .filter(|entry| &entry.out.pub_key == pub_key)
            .map(|entry| u64::from(entry.out.amount))
            .sum()
    }

    #[must_use]
    pub fn stats(&self) -> BlockchainStats {
        BlockchainStats {
            height: self.chain.len(),
            unspent_count: self.unspent.len(),
            tip_difficulty: self.tip().info.difficulty,
        }
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::create()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::KeyPair;

    #[test]
    fn create_starts_at_the_fixed_genesis_with_no_unspent_outputs() {
        let chain = Blockchain::create();
        assert_eq!(chain.chain.len(), 1);
        assert_eq!(chain.chain[0], Block::genesis());
        assert!(chain.unspent.is_empty());
    }

    #[test]
    fn mine_next_block_credits_the_miner_and_updates_the_unspent_set() {
        let mut chain = Blockchain::create();
        let miner = KeyPair::generate().unwrap();

        chain
            .mine_next_block(miner.to_public_bytes(), vec![], vec![], 1)
            .unwrap();

        assert_eq!(chain.chain.len(), 2);
        assert_eq!(chain.unspent.len(), 1);
        assert_eq!(chain.balance_of(&miner.to_public_bytes()), 50);
    }

    #[test]
    fn mine_next_block_can_include_a_spend_of_an_earlier_coinbase() {
        let mut chain = Blockchain::create();
        let miner = KeyPair::generate().unwrap();
        let receiver = KeyPair::generate().unwrap();

        chain
            .mine_next_block(miner.to_public_bytes(), vec![], vec![], 1)
            .unwrap();

        let spend =
            Transaction::create(&miner, receiver.to_public_bytes(), 20, &chain.unspent).unwrap();
        chain
            .mine_next_block(miner.to_public_bytes(), vec![spend], vec![], 2)
            .unwrap();

        assert_eq!(chain.balance_of(&receiver.to_public_bytes()), 20);
        assert_eq!(chain.balance_of(&miner.to_public_bytes()), 50 + 30);
    }

    #[test]
    fn mine_next_block_rejects_oversized_data() {
        let mut chain = Blockchain::create();
        let miner = KeyPair::generate().unwrap();
        let oversized = vec![0u8; crate::constants::BLOCKCHAIN_DATA_MAX + 1];

        assert!(matches!(
            chain.mine_next_block(miner.to_public_bytes(), vec![], oversized, 1),
            Err(BlockchainError::InvalidArgument(_))
        ));
    }
}
