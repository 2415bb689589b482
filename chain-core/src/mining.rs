//! A thin miner wrapper around [`Blockchain::mine_next_block`], plus a
//! hashrate estimator for tuning difficulty by hand.

use std::time::Instant;

use shared::Result;

use crate::block::{Block, BlockData};
use crate::blockchain::Blockchain;
use crate::transaction::Transaction;

/// Configuration for a single miner: which public key receives the
/// coinbase reward. Mining itself is always single-threaded — there is
/// no worker-pool configuration here.
#[derive(Debug, Clone, Copy)]
pub struct MinerConfig {
    pub reward_pub: [u8; shared::EC_PUB_LEN],
}

/// Mines blocks on top of a [`Blockchain`] on behalf of `config`'s
/// reward key.
#[derive(Debug, Clone, Copy)]
pub struct Miner {
    config: MinerConfig,
}

impl Miner {
    #[must_use]
    pub fn new(config: MinerConfig) -> Self {
        Self { config }
    }

    /// Mines and appends the next block, crediting the configured
    /// reward key with the coinbase.
    ///
    /// # Errors
    ///
    /// Propagates [`Blockchain::mine_next_block`] failures.
    pub fn mine_next(
        &self,
        chain: &mut Blockchain,
        transactions: Vec<Transaction>,
        data: Vec<u8>,
        timestamp: u64,
    ) -> Result<&Block> {
        chain.mine_next_block(self.config.reward_pub, transactions, data, timestamp)
    }

    /// Estimates hashes per second at `difficulty` by mining
    /// `sample_blocks` throwaway blocks on top of genesis and timing
    /// the total nonce search.
    #[must_use]
    pub fn estimate_hashrate(difficulty: u32, sample_blocks: u32) -> f64 {
        let genesis = Block::genesis();
        let start = Instant::now();
        let mut total_nonces: u64 = 0;

        for i in 0..sample_blocks {
            let mut block = Block::create(
                &genesis,
                BlockData::new(vec![]).unwrap(),
                None,
                difficulty,
                u64::from(i),
            );
            block.mine();
            total_nonces += block.info.nonce + 1;
        }

        let elapsed = start.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        total_nonces as f64 / elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::KeyPair;

    #[test]
    fn mine_next_appends_a_block_crediting_the_reward_key() {
        let miner_key = KeyPair::generate().unwrap();
        let miner = Miner::new(MinerConfig {
            reward_pub: miner_key.to_public_bytes(),
        });
        let mut chain = Blockchain::create();

        miner.mine_next(&mut chain, vec![], vec![], 1).unwrap();

        assert_eq!(chain.chain.len(), 2);
        assert_eq!(chain.balance_of(&miner_key.to_public_bytes()), 50);
    }

    #[test]
    fn estimate_hashrate_returns_a_nonnegative_rate() {
        let rate = Miner::estimate_hashrate(1, 2);
        assert!(rate >= 0.0);
    }
}
