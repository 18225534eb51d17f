use blockchain_core::ChainError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("expected {expected} validator txs, got {got}")]
    WrongValidatorCount { expected: usize, got: usize },
    #[error("validator tx at position {0} has the wrong selector for its slot")]
    SelectorMismatch(usize),
    #[error("committee slot {slot} expected signer {expected} but got {got}")]
    WrongSigner {
        slot: usize,
        expected: blockchain_crypto::Address,
        got: blockchain_crypto::Address,
    },
    #[error("randomSeed payload does not hash to the paired randomHash payload at slot {0}")]
    HashMismatch(usize),
    #[error("recovered block producer does not match randomList[0]")]
    WrongProducer,
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
