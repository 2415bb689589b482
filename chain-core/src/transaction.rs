//! Transactions: coinbase minting, spends, and signature verification.

use serde::{Deserialize, Serialize};
use shared::{BlockchainError, Hash256, KeyPair, Result, Signature};

use crate::constants::COINBASE_AMOUNT;
use crate::utxo::{OutputRef, TxOut, UnspentTxOut};

/// The sentinel `tx_out_hash` a coinbase input carries: `block_index`
/// in little-endian order in the first 4 bytes, zero afterward. Not a
/// hash of anything — just a fixed-width marker distinguishing one
/// coinbase from another.
fn coinbase_marker(block_index: u32) -> Hash256 {
    let mut bytes = [0u8; 32];
    bytes[0..4].copy_from_slice(&block_index.to_le_bytes());
    Hash256::from_bytes(bytes)
}

/// A reference to an unspent output being consumed, plus the signature
/// authorizing the spend.
///
/// The signature starts empty: [`TxIn::create`] builds an unsigned input
/// and [`Transaction::sign`] fills it in once the owning transaction's
/// id is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub block_hash: Hash256,
    pub tx_id: Hash256,
    pub tx_out_hash: Hash256,
    pub sig: Signature,
}

impl TxIn {
    /// Builds an unsigned input pointing at `unspent`.
    #[must_use]
    pub fn create(unspent: &UnspentTxOut) -> Self {
        Self {
            block_hash: unspent.block_hash,
            tx_id: unspent.tx_id,
            tx_out_hash: unspent.out.hash,
            sig: Signature::empty(),
        }
    }

    #[must_use]
    pub fn output_ref(&self) -> OutputRef {
        OutputRef {
            block_hash: self.block_hash,
            tx_id: self.tx_id,
            out_hash: self.tx_out_hash,
        }
    }

    fn hash_fields(&self) -> [Hash256; 3] {
        [self.block_hash, self.tx_id, self.tx_out_hash]
    }
}

/// A transaction: some inputs spending prior outputs, and new outputs
/// they create. `id` is the transaction's own hash and is always kept
/// in sync with `inputs`/`outputs` by [`Transaction::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub id: Hash256,
}

impl Transaction {
    /// Builds a transaction and computes its id.
    #[must_use]
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        let id = Self::compute_id(&inputs, &outputs);
        Self {
            inputs,
            outputs,
            id,
        }
    }

    /// Hashes `(3 * inputs.len() + outputs.len()) * 32` bytes: each
    /// input's `(block_hash, tx_id, tx_out_hash)` triple followed by
    /// each output's hash, in order. An empty transaction hashes an
    /// empty buffer.
    fn compute_id(inputs: &[TxIn], outputs: &[TxOut]) -> Hash256 {
        let mut buf = Vec::with_capacity((3 * inputs.len() + outputs.len()) * 32);
        for input in inputs {
            for field in input.hash_fields() {
                buf.extend_from_slice(field.as_bytes());
            }
        }
        for output in outputs {
            buf.extend_from_slice(output.hash.as_bytes());
        }
        Hash256::sha256(&buf)
    }

    /// Mints `COINBASE_AMOUNT` to `receiver_pub`. The coinbase has no
    /// inputs and is exempt from balance validation.
    #[must_use]
    pub fn coinbase_create(receiver_pub: [u8; shared::EC_PUB_LEN], block_index: u32) -> Self {
        let out = TxOut {
            amount: COINBASE_AMOUNT,
            pub_key: receiver_pub,
            hash: Hash256::sha256(&{
                let mut buf = [0u8; 4 + shared::EC_PUB_LEN];
                buf[0..4].copy_from_slice(&COINBASE_AMOUNT.to_le_bytes());
                buf[4..].copy_from_slice(&receiver_pub);
                buf
            }),
        };
        let inputs = vec![TxIn {
            block_hash: Hash256::zero(),
            tx_id: Hash256::zero(),
            tx_out_hash: coinbase_marker(block_index),
            sig: Signature::empty(),
        }];
        Self::new(inputs, vec![out])
    }

    /// A coinbase is valid iff it has exactly one unsigned input whose
    /// `tx_out_hash` holds `block_index` (little-endian) in its first 4
    /// bytes and zeros afterward, exactly one output of
    /// `COINBASE_AMOUNT`, and its id matches the recomputed hash.
    #[must_use]
    pub fn coinbase_is_valid(&self, block_index: u32) -> bool {
        if self.inputs.len() != 1 || self.outputs.len() != 1 {
            return false;
        }
        let input = &self.inputs[0];
        if input.block_hash != Hash256::zero() || input.tx_id != Hash256::zero() {
            return false;
        }
        if input.tx_out_hash != coinbase_marker(block_index) {
            return false;
        }
        if !input.sig.is_empty() {
            return false;
        }
        if self.outputs[0].amount != COINBASE_AMOUNT {
            return false;
        }
        self.id == Self::compute_id(&self.inputs, &self.outputs)
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].block_hash == Hash256::zero()
    }

    /// Signs every input with `sender`, after checking each referenced
    /// unspent output is actually owned by `sender`'s public key.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::NotFound`] if an input has no matching
    /// entry in `unspent`, and [`BlockchainError::ValidationFailure`] if
    /// a matched entry's owner differs from `sender`.
    pub fn sign(&mut self, sender: &KeyPair, unspent: &[UnspentTxOut]) -> Result<()> {
        let sender_pub = sender.to_public_bytes();
        let id = self.id;
        for input in &mut self.inputs {
            let reference = input.output_ref();
            let matched = unspent
                .iter()
                .find(|entry| entry.output_ref() == reference)
                .ok_or_else(|| {
                    BlockchainError::NotFound(format!(
                        "no unspent output matches input {:?}",
                        reference
                    ))
                })?;
            if matched.out.pub_key != sender_pub {
                return Err(BlockchainError::ValidationFailure(
                    "signing key does not own the referenced output".to_string(),
                ));
            }
            input.sig = sender.sign(id.as_bytes())?;
        }
        Ok(())
    }

    /// Builds and signs a transaction spending enough of `sender`'s
    /// unspent outputs to cover `amount`, paying `amount` to
    /// `receiver_pub` and any leftover back to `sender` as change.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::InvalidArgument`] if `amount` is zero,
    /// and [`BlockchainError::ValidationFailure`] if `sender`'s unspent
    /// outputs do not cover `amount`.
    pub fn create(
        sender: &KeyPair,
        receiver_pub: [u8; shared::EC_PUB_LEN],
        amount: u32,
        unspent: &[UnspentTxOut],
    ) -> Result<Self> {
        if amount == 0 {
            return Err(BlockchainError::InvalidArgument(
                "transaction amount must be nonzero".to_string(),
            ));
        }
        let sender_pub = sender.to_public_bytes();
        let mut selected = Vec::new();
        let mut total: u64 = 0;
        for entry in unspent.iter().filter(|e| e.out.pub_key == sender_pub) {
            selected.push(entry);
            total += u64::from(entry.out.amount);
            if total >= u64::from(amount) {
                break;
            }
        }
        if total < u64::from(amount) {
            return Err(BlockchainError::ValidationFailure(
                "insufficient unspent balance for transaction".to_string(),
            ));
        }

        let inputs: Vec<TxIn> = selected.iter().map(|entry| TxIn::create(entry)).collect();
        let mut outputs = vec![TxOut::create(amount, receiver_pub)?];
        let change = total - u64::from(amount);
        if change > 0 {
            outputs.push(TxOut::create(
                u32::try_from(change).map_err(|_| {
                    BlockchainError::InvalidArgument("change amount overflows u32".to_string())
                })?,
                sender_pub,
            )?);
        }

        let mut tx = Self::new(inputs, outputs);
        tx.sign(sender, unspent)?;
        Ok(tx)
    }

    /// Recomputes the id, rejects duplicate inputs, verifies every
    /// input's signature against the referenced unspent output's owner,
    /// and checks that total input value equals total output value.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::ValidationFailure`] for a stale id,
    /// duplicate inputs, or an input/output value mismatch, and
    /// [`BlockchainError::NotFound`] if an input has no matching
    /// unspent entry.
    pub fn is_valid(&self, unspent: &[UnspentTxOut]) -> Result<()> {
        if self.id != Self::compute_id(&self.inputs, &self.outputs) {
            return Err(BlockchainError::ValidationFailure(
                "transaction id does not match its inputs and outputs".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::with_capacity(self.inputs.len());
        for input in &self.inputs {
            if !seen.insert(input.output_ref()) {
                return Err(BlockchainError::ValidationFailure(
                    "transaction spends the same output twice".to_string(),
                ));
            }
        }

        let mut total_in: u64 = 0;
        for input in &self.inputs {
            let reference = input.output_ref();
            let matched = unspent
                .iter()
                .find(|entry| entry.output_ref() == reference)
                .ok_or_else(|| {
                    BlockchainError::NotFound(format!(
                        "no unspent output matches input {:?}",
                        reference
                    ))
                })?;
            let key = KeyPair::from_public_bytes(&matched.out.pub_key)?;
            let verified = !input.sig.is_empty() && key.verify(self.id.as_bytes(), &input.sig)?;
            if !verified {
                return Err(BlockchainError::ValidationFailure(
                    "transaction input has an invalid signature".to_string(),
                ));
            }
            total_in += u64::from(matched.out.amount);
        }

        let total_out: u64 = self.outputs.iter().map(|o| u64::from(o.amount)).sum();
        if total_in != total_out {
            return Err(BlockchainError::ValidationFailure(
                "transaction inputs and outputs do not balance".to_string(),
            ));
        }

        Ok(())
    }
}
