//! §7's error taxonomy mapped onto Ethereum-JSON-RPC-style numeric codes —
//! the only place in the workspace that decides what those codes are.

use blockchain_core::ChainError;
use blockchain_state::StateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RpcError {
    pub fn code(&self) -> i64 {
        match self {
            RpcError::InvalidParams(_) => -32602,
            RpcError::NotFound(_) => -32001,
            RpcError::State(_) => -32000,
            RpcError::Internal(_) => -32603,
        }
    }
}

impl From<ChainError> for RpcError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::NotFound => RpcError::NotFound("no matching block or transaction".into()),
            other => RpcError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
