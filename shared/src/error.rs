use thiserror::Error;

/// Error taxonomy shared by every crate in the workspace.
///
/// Low-level primitives (hashing, key derivation, I/O, wire parsing)
/// surface their failure unchanged through these variants. Validation
/// checks (block/transaction rules) collapse their sub-failures into
/// [`BlockchainError::ValidationFailure`] — callers only need to accept
/// or reject, never inspect which rule tripped.
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Modeled for taxonomic completeness; Rust's global allocator aborts
    /// the process on allocation failure rather than returning a `Result`,
    /// so library code never constructs this variant.
    #[error("allocation failure")]
    AllocationFailure,

    #[error("cryptographic failure: {0}")]
    CryptoFailure(String),

    #[error("I/O failure: {0}")]
    IoFailure(String),

    #[error("format error: {0}")]
    FormatError(String),

    #[error("validation failure: {0}")]
    ValidationFailure(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        Self::IoFailure(err.to_string())
    }
}

impl From<secp256k1::Error> for BlockchainError {
    fn from(err: secp256k1::Error) -> Self {
        Self::CryptoFailure(err.to_string())
    }
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BlockchainError>;
