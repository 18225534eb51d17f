use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BankError {
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("arithmetic overflow")]
    Overflow,
}
