//! rdPoS consensus (§4.9): committee derivation, the commit-reveal
//! randomness pipeline, and the producer/committee/bystander worker loop.

pub mod error;
pub mod rdpos;
pub mod shuffle;
pub mod worker;

pub use error::{ConsensusError, Result};
pub use rdpos::{RdPos, MIN_VALIDATORS};
pub use shuffle::shuffle;
pub use worker::{role_of, run, run_round, ConsensusHost, Role};
