//! The gossip substrate (§6): a `GossipHandle` contract the core consumes,
//! a `LoopbackGossip` test double, and a thin libp2p-identity-backed
//! `P2pGossip` whose transport wiring is deliberately out of scope.

pub mod error;
pub mod gossip;
pub mod p2p;

pub use error::{NetworkError, Result};
pub use gossip::{GossipBroadcaster, GossipHandle, LoopbackGossip, PeerId, SessionKind};
pub use p2p::P2pGossip;
