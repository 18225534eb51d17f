//! The JSON-RPC surface (§6): [`api::RpcApi`] implements every method
//! against [`blockchain_state::State`], [`log_index::EventIndex`] keeps the
//! receipt/event history a pure block-applying `State` doesn't retain, and
//! [`server`] exposes both over HTTP.

pub mod api;
pub mod error;
pub mod log_index;
pub mod server;

pub use api::{RpcApi, TransactionReceipt};
pub use error::{Result, RpcError};
pub use log_index::{EventIndex, IndexedEvent};
