use blockchain_crypto::CryptoError;
use thiserror::Error;

/// Error taxonomy from spec §7, restricted to the parts owned by this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("malformed data: {0}")]
    Malformed(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] CryptoError),
    #[error("wrong chain id: expected {expected}, got {got}")]
    WrongChainId { expected: u32, got: u32 },
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },
    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: u128, required: u128 },
    #[error("duplicate transaction")]
    Duplicate,
    #[error("invalid block: {0}")]
    InvalidBlock(String),
    #[error("storage error: {0}")]
    Storage(#[from] blockchain_storage::StorageError),
    #[error("not found")]
    NotFound,
}
