//! Contract runtime: journaled state ([`Safe`]), the per-call journal
//! ([`CallLogger`]), the `Contract` trait, and the dispatcher
//! ([`ContractManager`]) that ties them together (§4.6/§4.7).

pub mod contract;
pub mod context;
pub mod error;
pub mod event;
pub mod logger;
pub mod manager;
pub mod safe;

pub use contract::{Contract, MethodKind};
pub use context::CallContext;
pub use error::{Result, RuntimeError};
pub use event::Event;
pub use logger::{CallLogger, CommittedFrame};
pub use manager::{CallOutcome, ContractManager};
pub use safe::{Safe, SafeMap, SafeVec};
