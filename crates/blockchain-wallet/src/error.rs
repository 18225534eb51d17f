use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("invalid secret key: {0}")]
    InvalidKey(String),
    #[error("keystore file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("keystore serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WalletError>;
