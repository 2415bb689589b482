//! UTXO-based blockchain core: blocks, transactions, mining, and
//! canonical binary persistence.

pub mod block;
pub mod blockchain;
pub mod constants;
pub mod difficulty;
pub mod mining;
pub mod serialize;
pub mod transaction;
pub mod utxo;

pub use block::{Block, BlockData, BlockInfo};
pub use blockchain::{Blockchain, BlockchainStats, NetworkParams};
pub use mining::{Miner, MinerConfig};
pub use serialize::{deserialize_blockchain, serialize_blockchain};
pub use transaction::{Transaction, TxIn};
pub use utxo::{update_unspent, OutputRef, TxOut, UnspentTxOut};
