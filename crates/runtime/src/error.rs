use thiserror::Error;

/// Runtime-policy error taxonomy, the part of §7 owned by the contract
/// dispatcher (§4.7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("no contract deployed at the target address")]
    NoContract,
    #[error("no method matches selector {0:02x?}")]
    NoMethod([u8; 4]),
    #[error("reentrancy: {0} is already active in this call chain")]
    Reentrancy(String),
    #[error("method is not payable")]
    NotPayable,
    #[error("caller is not the contract owner")]
    OnlyOwner,
    #[error("mutation attempted through a read-only (view) call")]
    ReadOnlyViolation,
    #[error("contract execution failed: {0}")]
    ContractExecution(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
