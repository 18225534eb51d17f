//! Key management (§6): keypair generation/import, a plaintext on-disk
//! keystore, and builders for signing the two wire transaction forms.

pub mod builder;
pub mod error;
pub mod keypair;
pub mod keystore;

pub use builder::{sign_block_tx, sign_validator_tx};
pub use error::{Result, WalletError};
pub use keypair::Keypair;
