//! Fixed protocol constants. Unlike `NetworkParams`, these are not
//! runtime-configurable — the wire format and consensus rules assume
//! exactly these values.

/// Maximum size in bytes of a block's free-form data payload.
pub const BLOCKCHAIN_DATA_MAX: usize = 1024;

/// Amount minted by a coinbase transaction.
pub const COINBASE_AMOUNT: u32 = 50;

/// Target seconds between blocks used by the difficulty retarget rule.
pub const BLOCK_GENERATION_INTERVAL: u64 = 1;

/// Number of blocks between difficulty retarget checks.
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u32 = 5;

/// Expected elapsed time, in seconds, across one adjustment interval.
pub const EXPECTED_BLOCK_INTERVAL: u64 =
    BLOCK_GENERATION_INTERVAL * DIFFICULTY_ADJUSTMENT_INTERVAL as u64;

/// Index of the fixed genesis block.
pub const GENESIS_INDEX: u32 = 0;

/// Unix timestamp baked into the genesis block.
pub const GENESIS_TIMESTAMP: u64 = 1_537_578_000;

/// Free-form data payload baked into the genesis block.
pub const GENESIS_DATA: &[u8] = b"Holberton School";

/// The genesis block's hash, `SHA256(info || data)` with the fixed
/// fields above. Pinned as a literal rather than recomputed so a typo
/// in the hashing code cannot silently redefine genesis.
pub const GENESIS_HASH: [u8; 32] = [
    0xc5, 0x2c, 0x26, 0xc8, 0xb5, 0x46, 0x16, 0x39, 0x63, 0x5d, 0x8e, 0xdf, 0x2a, 0x97, 0xd4, 0x8d,
    0x0c, 0x8e, 0x00, 0x09, 0xc8, 0x17, 0xf2, 0xb1, 0xd3, 0xd7, 0xff, 0x2f, 0x04, 0x51, 0x58, 0x03,
];
