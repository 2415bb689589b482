//! Canonical binary persistence for a [`Blockchain`].
//!
//! The format is a fixed `HBLK0.3` header, a one-byte endianness tag,
//! then the block list and the unspent set, field by field. Multi-byte
//! numeric fields are written in the host's native byte order and
//! swapped on read only when the tag disagrees with the reading host;
//! hashes, public keys, signatures, and free-form data are always
//! written and read raw, never swapped.
//!
//! Field order is fixed, matching the wire layout every conforming
//! reader expects: a block is `index, difficulty, timestamp, nonce,
//! prev_hash, data_len, data, hash, tx_marker[, transactions]`; a
//! transaction is `id, in_count, out_count, inputs, outputs`; an input
//! is `block_hash, tx_id, tx_out_hash, sig_bytes(72, zero-padded),
//! sig_len(1)`.

use std::io::{Cursor, Read};

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use shared::{BlockchainError, Hash256, Result};

use crate::block::{Block, BlockData, BlockInfo};
use crate::blockchain::Blockchain;
use crate::transaction::{Transaction, TxIn};
use crate::utxo::{TxOut, UnspentTxOut};

const MAGIC: &[u8; 4] = b"HBLK";
const VERSION: &[u8; 3] = b"0.3";
const ENDIAN_LITTLE: u8 = 1;
const ENDIAN_BIG: u8 = 2;
const NO_TRANSACTIONS: i32 = -1;

fn host_endian_tag() -> u8 {
    if cfg!(target_endian = "little") {
        ENDIAN_LITTLE
    } else {
        ENDIAN_BIG
    }
}

/// Serializes `chain` into the canonical binary format.
///
/// # Errors
///
/// Returns [`BlockchainError::InvalidArgument`] if a signature exceeds
/// [`shared::SIG_MAX_LEN`] (which should never happen for signatures
/// produced by this crate).
pub fn serialize_blockchain(chain: &Blockchain) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(VERSION);
    buf.write_u8(host_endian_tag())?;
    buf.write_u32::<NativeEndian>(u32::try_from(chain.chain.len()).unwrap_or(u32::MAX))?;
    buf.write_u32::<NativeEndian>(u32::try_from(chain.unspent.len()).unwrap_or(u32::MAX))?;

    for block in &chain.chain {
        write_block(&mut buf, block)?;
    }
    for entry in &chain.unspent {
        write_unspent(&mut buf, entry)?;
    }

    Ok(buf)
}

/// Deserializes a [`Blockchain`] previously written by
/// [`serialize_blockchain`].
///
/// # Errors
///
/// Returns [`BlockchainError::FormatError`] if the header is wrong, the
/// bytes are truncated, or a block's stored hash does not match its
/// recomputed hash.
pub fn deserialize_blockchain(bytes: &[u8]) -> Result<Blockchain> {
    let mut cursor = Cursor::new(bytes);

    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic).map_err(format_err)?;
    if &magic != MAGIC {
        return Err(BlockchainError::FormatError(
            "bad magic: not an HBLK blockchain file".to_string(),
        ));
    }
    let mut version = [0u8; 3];
    cursor.read_exact(&mut version).map_err(format_err)?;
    if &version != VERSION {
        return Err(BlockchainError::FormatError(format!(
            "unsupported blockchain file version {:?}",
            version
        )));
    }
    let endian_tag = cursor.read_u8().map_err(format_err)?;
    let swap = endian_tag != host_endian_tag();

    let block_count = read_u32(&mut cursor, swap)?;
    let unspent_count = read_u32(&mut cursor, swap)?;

    let mut chain = Vec::with_capacity(block_count as usize);
    for _ in 0..block_count {
        chain.push(read_block(&mut cursor, swap)?);
    }
    let mut unspent = Vec::with_capacity(unspent_count as usize);
    for _ in 0..unspent_count {
        unspent.push(read_unspent(&mut cursor, swap)?);
    }

    Ok(Blockchain { chain, unspent })
}

fn write_block(buf: &mut Vec<u8>, block: &Block) -> Result<()> {
    buf.write_u32::<NativeEndian>(block.info.index)?;
    buf.write_u32::<NativeEndian>(block.info.difficulty)?;
    buf.write_u64::<NativeEndian>(block.info.timestamp)?;
    buf.write_u64::<NativeEndian>(block.info.nonce)?;
    buf.extend_from_slice(block.info.prev_hash.as_bytes());

    let data = block.data.as_bytes();
    buf.write_u32::<NativeEndian>(u32::try_from(data.len()).unwrap_or(u32::MAX))?;
    buf.extend_from_slice(data);

    buf.extend_from_slice(block.hash.as_bytes());

    match &block.transactions {
        None => {
            buf.write_i32::<NativeEndian>(NO_TRANSACTIONS)?;
        }
        Some(transactions) => {
            buf.write_i32::<NativeEndian>(i32::try_from(transactions.len()).unwrap_or(i32::MAX))?;
            for tx in transactions {
                write_transaction(buf, tx)?;
            }
        }
    }

    Ok(())
}

fn read_block(cursor: &mut Cursor<&[u8]>, swap: bool) -> Result<Block> {
    let index = read_u32(cursor, swap)?;
    let difficulty = read_u32(cursor, swap)?;
    let timestamp = read_u64(cursor, swap)?;
    let nonce = read_u64(cursor, swap)?;
    let prev_hash = read_hash(cursor)?;

    let data_len = read_u32(cursor, swap)? as usize;
    let mut data_bytes = vec![0u8; data_len];
    cursor.read_exact(&mut data_bytes).map_err(format_err)?;
    let data = BlockData::new(data_bytes)?;

    let stored_hash = read_hash(cursor)?;

    let tx_marker = read_i32(cursor, swap)?;
    let transactions = if tx_marker < 0 {
        None
    } else {
        let mut transactions = Vec::with_capacity(tx_marker as usize);
        for _ in 0..tx_marker {
            transactions.push(read_transaction(cursor, swap)?);
        }
        Some(transactions)
    };

    let info = BlockInfo {
        index,
        difficulty,
        timestamp,
        nonce,
        prev_hash,
    };
    let recomputed = Block::compute_hash(&info, &data, transactions.as_deref());
    if recomputed != stored_hash {
        return Err(BlockchainError::FormatError(
            "block hash does not match its stored fields".to_string(),
        ));
    }

    Ok(Block {
        info,
        data,
        transactions,
        hash: stored_hash,
    })
}

fn write_transaction(buf: &mut Vec<u8>, tx: &Transaction) -> Result<()> {
    buf.extend_from_slice(tx.id.as_bytes());
    buf.write_u32::<NativeEndian>(u32::try_from(tx.inputs.len()).unwrap_or(u32::MAX))?;
    buf.write_u32::<NativeEndian>(u32::try_from(tx.outputs.len()).unwrap_or(u32::MAX))?;

    for input in &tx.inputs {
        buf.extend_from_slice(input.block_hash.as_bytes());
        buf.extend_from_slice(input.tx_id.as_bytes());
        buf.extend_from_slice(input.tx_out_hash.as_bytes());
        let sig_bytes = input.sig.as_bytes();
        if sig_bytes.len() > shared::SIG_MAX_LEN {
            return Err(BlockchainError::InvalidArgument(
                "signature exceeds the maximum wire length".to_string(),
            ));
        }
        let mut padded = [0u8; shared::SIG_MAX_LEN];
        padded[..sig_bytes.len()].copy_from_slice(sig_bytes);
        buf.extend_from_slice(&padded);
        buf.write_u8(u8::try_from(sig_bytes.len()).expect("checked above"))?;
    }

    for output in &tx.outputs {
        buf.write_u32::<NativeEndian>(output.amount)?;
        buf.extend_from_slice(&output.pub_key);
        buf.extend_from_slice(output.hash.as_bytes());
    }

    Ok(())
}

fn read_transaction(cursor: &mut Cursor<&[u8]>, swap: bool) -> Result<Transaction> {
    let id = read_hash(cursor)?;
    let input_count = read_u32(cursor, swap)?;
    let output_count = read_u32(cursor, swap)?;

    let mut inputs = Vec::with_capacity(input_count as usize);
    for _ in 0..input_count {
        let block_hash = read_hash(cursor)?;
        let tx_id = read_hash(cursor)?;
        let tx_out_hash = read_hash(cursor)?;
        let mut padded = [0u8; shared::SIG_MAX_LEN];
        cursor.read_exact(&mut padded).map_err(format_err)?;
        let sig_len = cursor.read_u8().map_err(format_err)? as usize;
        let sig = shared::Signature::from_der(&padded[..sig_len])?;
        inputs.push(TxIn {
            block_hash,
            tx_id,
            tx_out_hash,
            sig,
        });
    }

    let mut outputs = Vec::with_capacity(output_count as usize);
    for _ in 0..output_count {
        let amount = read_u32(cursor, swap)?;
        let mut pub_key = [0u8; shared::EC_PUB_LEN];
        cursor.read_exact(&mut pub_key).map_err(format_err)?;
        let hash = read_hash(cursor)?;
        outputs.push(TxOut {
            amount,
            pub_key,
            hash,
        });
    }

    Ok(Transaction { inputs, outputs, id })
}

fn write_unspent(buf: &mut Vec<u8>, entry: &UnspentTxOut) -> Result<()> {
    buf.extend_from_slice(entry.block_hash.as_bytes());
    buf.extend_from_slice(entry.tx_id.as_bytes());
    buf.write_u32::<NativeEndian>(entry.out.amount)?;
    buf.extend_from_slice(&entry.out.pub_key);
    buf.extend_from_slice(entry.out.hash.as_bytes());
    Ok(())
}

fn read_unspent(cursor: &mut Cursor<&[u8]>, swap: bool) -> Result<UnspentTxOut> {
    let block_hash = read_hash(cursor)?;
    let tx_id = read_hash(cursor)?;
    let amount = read_u32(cursor, swap)?;
    let mut pub_key = [0u8; shared::EC_PUB_LEN];
    cursor.read_exact(&mut pub_key).map_err(format_err)?;
    let hash = read_hash(cursor)?;
    Ok(UnspentTxOut {
        block_hash,
        tx_id,
        out: TxOut {
            amount,
            pub_key,
            hash,
        },
    })
}

fn read_hash(cursor: &mut Cursor<&[u8]>) -> Result<Hash256> {
    let mut bytes = [0u8; 32];
    cursor.read_exact(&mut bytes).map_err(format_err)?;
    Ok(Hash256::from_bytes(bytes))
}

fn read_u32(cursor: &mut Cursor<&[u8]>, swap: bool) -> Result<u32> {
    let v = cursor.read_u32::<NativeEndian>().map_err(format_err)?;
    Ok(if swap { v.swap_bytes() } else { v })
}

fn read_u64(cursor: &mut Cursor<&[u8]>, swap: bool) -> Result<u64> {
    let v = cursor.read_u64::<NativeEndian>().map_err(format_err)?;
    Ok(if swap { v.swap_bytes() } else { v })
}

fn read_i32(cursor: &mut Cursor<&[u8]>, swap: bool) -> Result<i32> {
    let v = cursor.read_i32::<NativeEndian>().map_err(format_err)?;
    Ok(if swap { v.swap_bytes() } else { v })
}

fn format_err(e: std::io::Error) -> BlockchainError {
    BlockchainError::FormatError(format!("truncated or malformed blockchain file: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::KeyPair;

    #[test]
    fn header_bytes_match_the_fixed_magic_and_version() {
        let chain = Blockchain::create();
        let bytes = serialize_blockchain(&chain).unwrap();
        assert_eq!(&bytes[0..7], b"HBLK0.3");
    }

    #[test]
    fn genesis_only_chain_round_trips() {
        let chain = Blockchain::create();
        let bytes = serialize_blockchain(&chain).unwrap();
        let restored = deserialize_blockchain(&bytes).unwrap();
        assert_eq!(restored, chain);
    }

    #[test]
    fn chain_with_mined_blocks_and_a_spend_round_trips() {
        let mut chain = Blockchain::create();
        let miner = KeyPair::generate().unwrap();
        let receiver = KeyPair::generate().unwrap();

        chain
            .mine_next_block(miner.to_public_bytes(), vec![], b"first".to_vec(), 1)
            .unwrap();
        let spend =
            Transaction::create(&miner, receiver.to_public_bytes(), 10, &chain.unspent).unwrap();
        chain
            .mine_next_block(miner.to_public_bytes(), vec![spend], vec![], 2)
            .unwrap();

        let bytes = serialize_blockchain(&chain).unwrap();
        let restored = deserialize_blockchain(&bytes).unwrap();
        assert_eq!(restored, chain);
    }

    #[test]
    fn rejects_a_bad_magic() {
        let mut bytes = serialize_blockchain(&Blockchain::create()).unwrap();
        bytes[0] = b'X';
        assert!(deserialize_blockchain(&bytes).is_err());
    }

    #[test]
    fn rejects_a_tampered_block_field() {
        let chain = Blockchain::create();
        let mut bytes = serialize_blockchain(&chain).unwrap();
        // Header (7) + endian tag (1) + block_count (4) + unspent_count (4) = 16;
        // this flips a byte inside the genesis block's `index` field.
        bytes[16] ^= 0xFF;
        assert!(deserialize_blockchain(&bytes).is_err());
    }
}
