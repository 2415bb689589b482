//! Transaction outputs and the unspent-output (UTXO) index.

use serde::{Deserialize, Serialize};
use shared::{BlockchainError, Hash256, Result};

/// A transaction output: an amount assigned to a recipient's public key.
///
/// `hash` is a declared invariant, not just a cache: it is always
/// `SHA256(amount || pub)` over exactly `sizeof(u32) + 65` bytes, computed
/// in an explicit scratch buffer so no compiler padding ever leaks into
/// the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub amount: u32,
    pub pub_key: [u8; shared::EC_PUB_LEN],
    pub hash: Hash256,
}

impl TxOut {
    /// Creates an output, computing its hash.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::InvalidArgument`] if `amount` is zero.
    pub fn create(amount: u32, pub_key: [u8; shared::EC_PUB_LEN]) -> Result<Self> {
        if amount == 0 {
            return Err(BlockchainError::InvalidArgument(
                "tx_out amount must be nonzero".to_string(),
            ));
        }
        let hash = Self::compute_hash(amount, &pub_key);
        Ok(Self {
            amount,
            pub_key,
            hash,
        })
    }

    fn compute_hash(amount: u32, pub_key: &[u8; shared::EC_PUB_LEN]) -> Hash256 {
        let mut buf = [0u8; 4 + shared::EC_PUB_LEN];
        buf[0..4].copy_from_slice(&amount.to_le_bytes());
        buf[4..].copy_from_slice(pub_key);
        Hash256::sha256(&buf)
    }
}

/// Identifies exactly one [`UnspentTxOut`]: the block that created it,
/// the transaction that contains it, and the output's own hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    pub block_hash: Hash256,
    pub tx_id: Hash256,
    pub out_hash: Hash256,
}

/// An output not yet consumed by any transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentTxOut {
    pub block_hash: Hash256,
    pub tx_id: Hash256,
    pub out: TxOut,
}

impl UnspentTxOut {
    /// Stores a byte-for-byte copy of `out`; never aliases the caller's
    /// output instance.
    #[must_use]
    pub fn create(block_hash: Hash256, tx_id: Hash256, out: TxOut) -> Self {
        Self {
            block_hash,
            tx_id,
            out,
        }
    }

    #[must_use]
    pub fn output_ref(&self) -> OutputRef {
        OutputRef {
            block_hash: self.block_hash,
            tx_id: self.tx_id,
            out_hash: self.out.hash,
        }
    }
}

/// Rebuilds the unspent set after a block's transactions are applied.
///
/// Every entry of `old_unspent` survives unless some input of
/// `new_transactions` references it (matched on the full
/// `(block_hash, tx_id, out_hash)` triple); then every output of every
/// new transaction is appended, keyed by `new_block_hash`. Order is
/// preserved — surviving entries first, in their original order, then
/// new outputs in transaction/output order — so serialization round
/// trips byte-for-byte.
#[must_use]
pub fn update_unspent(
    new_transactions: &[crate::transaction::Transaction],
    new_block_hash: Hash256,
    old_unspent: &[UnspentTxOut],
) -> Vec<UnspentTxOut> {
    let consumed: std::collections::HashSet<OutputRef> = new_transactions
        .iter()
        .flat_map(|tx| tx.inputs.iter())
        .map(crate::transaction::TxIn::output_ref)
        .collect();

    let mut next: Vec<UnspentTxOut> = old_unspent
        .iter()
        .filter(|entry| !consumed.contains(&entry.output_ref()))
        .cloned()
        .collect();

    for tx in new_transactions {
        for output in &tx.outputs {
            next.push(UnspentTxOut::create(new_block_hash, tx.id, output.clone()));
        }
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pub(tag: u8) -> [u8; shared::EC_PUB_LEN] {
        let mut pk = [0u8; shared::EC_PUB_LEN];
        pk[0] = 0x04;
        pk[1] = tag;
        pk
    }

    #[test]
    fn tx_out_hash_matches_the_declared_formula() {
        let pub_key = sample_pub(1);
        let out = TxOut::create(50, pub_key).unwrap();

        let mut buf = [0u8; 4 + shared::EC_PUB_LEN];
        buf[0..4].copy_from_slice(&50u32.to_le_bytes());
        buf[4..].copy_from_slice(&pub_key);
        assert_eq!(out.hash, Hash256::sha256(&buf));
    }

    #[test]
    fn tx_out_create_rejects_zero_amount() {
        assert!(TxOut::create(0, sample_pub(1)).is_err());
    }

    #[test]
    fn update_unspent_removes_consumed_and_appends_new_outputs() {
        use crate::transaction::{Transaction, TxIn};

        let block_hash = Hash256::sha256(b"block-1");
        let tx_id = Hash256::sha256(b"tx-1");
        let out = TxOut::create(50, sample_pub(1)).unwrap();
        let existing = UnspentTxOut::create(block_hash, tx_id, out.clone());

        let input = TxIn::create(&existing);
        let new_out = TxOut::create(30, sample_pub(2)).unwrap();
        let change = TxOut::create(20, sample_pub(1)).unwrap();
        let spend_tx = Transaction::new(vec![input], vec![new_out.clone(), change.clone()]);

        let updated = update_unspent(
            std::slice::from_ref(&spend_tx),
            Hash256::sha256(b"block-2"),
            std::slice::from_ref(&existing),
        );

        assert_eq!(updated.len(), 2);
        assert!(updated
            .iter()
            .all(|u| u.output_ref() != existing.output_ref()));
        assert_eq!(updated[0].out, new_out);
        assert_eq!(updated[1].out, change);
    }
}
