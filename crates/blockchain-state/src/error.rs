use blockchain_consensus::ConsensusError;
use blockchain_core::ChainError;
use runtime::RuntimeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Consensus(#[from] ConsensusError),
    #[error("contract call failed: {0}")]
    Contract(#[from] RuntimeError),
    #[error("invalid block: {0}")]
    InvalidBlock(String),
}

pub type Result<T> = std::result::Result<T, StateError>;
