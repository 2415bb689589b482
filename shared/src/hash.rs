use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A 32-byte SHA-256 digest, used to identify blocks, transactions, and
/// unspent outputs alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// An all-zero hash, used for the genesis `prev_hash` and for
    /// coinbase inputs, which reference no real output.
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes the SHA-256 digest of `data`.
    #[must_use]
    pub fn sha256(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        Self(hash)
    }

    /// Whether the first `difficulty` bits of the hash (MSB-first within
    /// each byte) are zero. A `difficulty` greater than 256 never matches.
    #[must_use]
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        if difficulty > 256 {
            return false;
        }
        self.leading_zero_bits() >= difficulty
    }

    /// Number of leading zero bits in the hash.
    #[must_use]
    pub fn leading_zero_bits(&self) -> u32 {
        let mut zeros = 0;
        for &byte in &self.0 {
            if byte == 0 {
                zeros += 8;
            } else {
                zeros += byte.leading_zeros();
                break;
            }
        }
        zeros
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Computes the SHA-256 digest of `data`. Thin free-function form of
/// [`Hash256::sha256`], matching the `sha256(bytes) -> [u8; 32]` adapter
/// contract.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    *Hash256::sha256(data).as_bytes()
}
