//! Account ledger, the two wire-signed transaction forms, blocks, the
//! append-only block log, and the mempools. Everything here is pure data and
//! pure validation; the transition function that ties it to consensus and
//! the contract runtime lives in `blockchain-state`.

pub mod block;
pub mod error;
pub mod genesis;
pub mod ledger;
pub mod mempool;
pub mod rlp;
pub mod storage;
pub mod tx;

pub use block::{Block, BlockHeader, MutableBlock};
pub use error::ChainError;
pub use genesis::Genesis;
pub use ledger::{Account, Ledger};
pub use mempool::{UserMempool, ValidatorMempool};
pub use storage::BlockStore;
pub use tx::{BlockTx, ValidatorSelector, ValidatorTx};

pub type Result<T> = std::result::Result<T, ChainError>;
