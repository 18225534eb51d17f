//! The transition function (§4.8): ties the ledger, the two mempools, rdPoS,
//! block storage, and the contract runtime together behind one lock per
//! `State` instance, and adapts that state into the consensus worker's
//! [`ConsensusHost`] contract.

pub mod error;
pub mod host;
pub mod state;

pub use error::{Result, StateError};
pub use host::LocalConsensusHost;
pub use state::{BlockReceipt, Broadcaster, NullBroadcaster, NullReceiptSink, ReceiptSink, State, TxOutcome};
