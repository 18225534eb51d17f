//! Cryptographic primitives shared by the whole node: keccak-256 hashing,
//! 20-byte addresses, and secp256k1 signing/recovery.

pub mod address;
pub mod hash;
pub mod signature;

use thiserror::Error;

/// Core cryptographic errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key format: {0}")]
    InvalidKey(String),
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("non-canonical signature: s value is in the upper half of the curve order")]
    NonCanonicalSignature,
    #[error("invalid hash format: {0}")]
    InvalidHash(String),
    #[error("address format error: {0}")]
    AddressError(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

pub use address::Address;
pub use hash::Hash;
pub use signature::{recover_signer, sign_message, Signature};
