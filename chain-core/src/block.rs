//! Blocks: linked via hash, secured by proof of work.

use serde::{Deserialize, Serialize};
use shared::{BlockchainError, Hash256, Result};
use tracing::debug;

use crate::constants::{
    BLOCKCHAIN_DATA_MAX, GENESIS_DATA, GENESIS_HASH, GENESIS_INDEX, GENESIS_TIMESTAMP,
};
use crate::transaction::Transaction;
use crate::utxo::UnspentTxOut;

/// The fixed-size fields hashed to identify a block, excluding its
/// variable-length payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub index: u32,
    pub difficulty: u32,
    pub timestamp: u64,
    pub nonce: u64,
    pub prev_hash: Hash256,
}

/// A block's free-form payload, capped at [`BLOCKCHAIN_DATA_MAX`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockData(Vec<u8>);

impl BlockData {
    /// # Errors
    ///
    /// Returns [`BlockchainError::InvalidArgument`] if `bytes` exceeds
    /// [`BLOCKCHAIN_DATA_MAX`].
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() > BLOCKCHAIN_DATA_MAX {
            return Err(BlockchainError::InvalidArgument(format!(
                "block data of {} bytes exceeds the {BLOCKCHAIN_DATA_MAX}-byte maximum",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A block in the chain: its header fields, payload, optional
/// transaction list, and its own cached hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub info: BlockInfo,
    pub data: BlockData,
    pub transactions: Option<Vec<Transaction>>,
    pub hash: Hash256,
}

impl Block {
    /// Builds the fixed genesis block: a pinned literal, never mined.
    #[must_use]
    pub fn genesis() -> Self {
        let info = BlockInfo {
            index: GENESIS_INDEX,
            difficulty: 0,
            timestamp: GENESIS_TIMESTAMP,
            nonce: 0,
            prev_hash: Hash256::zero(),
        };
        let data = BlockData(GENESIS_DATA.to_vec());
        Self {
            info,
            data,
            transactions: None,
            hash: Hash256::from_bytes(GENESIS_HASH),
        }
    }

    /// Creates the next block to be mined on top of `prev`, with nonce
    /// zeroed and `difficulty`/`timestamp` set by the caller before
    /// mining.
    #[must_use]
    pub fn create(
        prev: &Block,
        data: BlockData,
        transactions: Option<Vec<Transaction>>,
        difficulty: u32,
        timestamp: u64,
    ) -> Self {
        let info = BlockInfo {
            index: prev.info.index + 1,
            difficulty,
            timestamp,
            nonce: 0,
            prev_hash: prev.hash,
        };
        let hash = Self::compute_hash(&info, &data, transactions.as_deref());
        Self {
            info,
            data,
            transactions,
            hash,
        }
    }

    /// `SHA256(info fields || data bytes || transaction ids)`, with the
    /// transaction-id suffix present only when `transactions` is
    /// `Some`. Fields are written in an explicit scratch buffer — never
    /// derived from the struct's in-memory layout — so alignment
    /// padding can never leak into the digest.
    #[must_use]
    pub fn compute_hash(
        info: &BlockInfo,
        data: &BlockData,
        transactions: Option<&[Transaction]>,
    ) -> Hash256 {
        let mut buf = Vec::with_capacity(56 + data.as_bytes().len() + 32);
        buf.extend_from_slice(&info.index.to_le_bytes());
        buf.extend_from_slice(&info.difficulty.to_le_bytes());
        buf.extend_from_slice(&info.timestamp.to_le_bytes());
        buf.extend_from_slice(&info.nonce.to_le_bytes());
        buf.extend_from_slice(info.prev_hash.as_bytes());
        buf.extend_from_slice(data.as_bytes());
        if let Some(txs) = transactions {
            for tx in txs {
                buf.extend_from_slice(tx.id.as_bytes());
            }
        }
        Hash256::sha256(&buf)
    }

    #[must_use]
    pub fn hash_matches_difficulty(hash: &Hash256, difficulty: u32) -> bool {
        hash.meets_difficulty(difficulty)
    }

    /// Mines this block in place: increments `nonce` from zero until
    /// `hash` satisfies `info.difficulty`, single-threaded.
    pub fn mine(&mut self) {
        loop {
            self.hash = Self::compute_hash(&self.info, &self.data, self.transactions.as_deref());
            if Self::hash_matches_difficulty(&self.hash, self.info.difficulty) {
                debug!(index = self.info.index, nonce = self.info.nonce, "block mined");
                return;
            }
            self.info.nonce += 1;
        }
    }

    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.info.index == GENESIS_INDEX
    }

    /// Validates linkage, proof of work, and (for non-genesis blocks)
    /// every transaction, against `prev` and the unspent set as it
    /// stood before this block was applied.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::ValidationFailure`] for any broken
    /// invariant: wrong index, wrong `prev_hash`, a stale cached hash,
    /// insufficient proof of work, a missing/invalid coinbase, or an
    /// invalid non-coinbase transaction.
    pub fn is_valid(&self, prev: &Block, unspent: &[UnspentTxOut]) -> Result<()> {
        if self.is_genesis() {
            if *self != Block::genesis() {
                return Err(BlockchainError::ValidationFailure(
                    "genesis block does not match the fixed literal".to_string(),
                ));
            }
            return Ok(());
        }

        if self.info.index != prev.info.index + 1 {
            return Err(BlockchainError::ValidationFailure(format!(
                "block index {} does not follow {}",
                self.info.index, prev.info.index
            )));
        }
        if self.info.prev_hash != prev.hash {
            return Err(BlockchainError::ValidationFailure(
                "block prev_hash does not match the previous block's hash".to_string(),
            ));
        }
        let recomputed = Self::compute_hash(&self.info, &self.data, self.transactions.as_deref());
        if recomputed != self.hash {
            return Err(BlockchainError::ValidationFailure(
                "block hash does not match its fields".to_string(),
            ));
        }
        if !Self::hash_matches_difficulty(&self.hash, self.info.difficulty) {
            return Err(BlockchainError::ValidationFailure(
                "block hash does not satisfy its declared difficulty".to_string(),
            ));
        }

        let transactions = self.transactions.as_deref().unwrap_or(&[]);
        let (coinbase_count, rest): (usize, Vec<&Transaction>) = {
            let mut count = 0;
            let mut rest = Vec::new();
            for tx in transactions {
                if tx.is_coinbase() {
                    count += 1;
                } else {
                    rest.push(tx);
                }
            }
            (count, rest)
        };
        if coinbase_count != 1 {
            return Err(BlockchainError::ValidationFailure(
                "block must contain exactly one coinbase transaction".to_string(),
            ));
        }
        let coinbase = transactions
            .iter()
            .find(|tx| tx.is_coinbase())
            .expect("coinbase_count == 1 guarantees one exists");
        if !coinbase.coinbase_is_valid(self.info.index) {
            return Err(BlockchainError::ValidationFailure(
                "block coinbase transaction is invalid".to_string(),
            ));
        }
        for tx in rest {
            tx.is_valid(unspent)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_hash_matches_the_fixed_literal() {
        let genesis = Block::genesis();
        let recomputed = Block::compute_hash(&genesis.info, &genesis.data, None);
        assert_eq!(recomputed, genesis.hash);
        assert_eq!(genesis.hash.as_bytes(), &GENESIS_HASH);
    }

    #[test]
    fn genesis_is_valid_against_itself() {
        let genesis = Block::genesis();
        genesis.is_valid(&genesis, &[]).unwrap();
    }

    #[test]
    fn mine_produces_a_hash_satisfying_its_difficulty() {
        let genesis = Block::genesis();
        let receiver_pub = shared::KeyPair::generate().unwrap().to_public_bytes();
        let coinbase = Transaction::coinbase_create(receiver_pub, 1);
        let mut block = Block::create(&genesis, BlockData::new(vec![]).unwrap(), Some(vec![coinbase]), 8, 1);
        block.mine();
        assert!(Block::hash_matches_difficulty(&block.hash, 8));
    }

    #[test]
    fn is_valid_rejects_a_tampered_hash_without_remining() {
        let genesis = Block::genesis();
        let receiver_pub = shared::KeyPair::generate().unwrap().to_public_bytes();
        let coinbase = Transaction::coinbase_create(receiver_pub, 1);
        let mut block = Block::create(&genesis, BlockData::new(vec![]).unwrap(), Some(vec![coinbase]), 4, 1);
        block.mine();

        let mut tampered = block.clone();
        tampered.info.timestamp += 1;
        assert!(tampered.is_valid(&genesis, &[]).is_err());
    }

    #[test]
    fn block_data_rejects_oversized_payloads() {
        assert!(BlockData::new(vec![0u8; BLOCKCHAIN_DATA_MAX + 1]).is_err());
        assert!(BlockData::new(vec![0u8; BLOCKCHAIN_DATA_MAX]).is_ok());
    }
}
