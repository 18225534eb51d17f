//! The gossip substrate contract (§6): operations the core consumes
//! (`broadcast*`, `request_validator_txs`, `session_ids`) plus the inbound
//! events a substrate delivers back into `blockchain-state` (new block, new
//! user tx, new validator tx, peer request for the current validator
//! mempool) — the inbound direction is just a normal call into
//! `State::add_tx`/`add_validator_tx`/`process_block`, made by whatever owns
//! the peer connection.

use crate::error::Result;
use blockchain_core::{Block, BlockTx, ValidatorTx};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; 32]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Block,
    UserTx,
    ValidatorTx,
}

pub trait GossipHandle: Send + Sync {
    fn broadcast_block(&self, block: &Block) -> Result<()>;
    fn broadcast_tx_block(&self, tx: &BlockTx) -> Result<()>;
    fn broadcast_tx_validator(&self, tx: &ValidatorTx) -> Result<()>;
    fn request_validator_txs(&self, peer: PeerId) -> Result<Vec<ValidatorTx>>;
    fn get_sessions_ids(&self, kind: SessionKind) -> Vec<PeerId>;
}

/// In-process test double: records every outbound call instead of putting
/// anything on a wire, and answers peer queries from a fixed peer table set
/// up by the test.
#[derive(Default)]
pub struct LoopbackGossip {
    pub sent_blocks: parking_lot::Mutex<Vec<Block>>,
    pub sent_tx_blocks: parking_lot::Mutex<Vec<BlockTx>>,
    pub sent_tx_validators: parking_lot::Mutex<Vec<ValidatorTx>>,
    peers_by_kind: parking_lot::RwLock<HashMap<SessionKind, Vec<PeerId>>>,
    validator_tx_responses: parking_lot::RwLock<HashMap<PeerId, Vec<ValidatorTx>>>,
}

impl LoopbackGossip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_peers(&self, kind: SessionKind, peers: Vec<PeerId>) {
        self.peers_by_kind.write().insert(kind, peers);
    }

    pub fn set_validator_tx_response(&self, peer: PeerId, txs: Vec<ValidatorTx>) {
        self.validator_tx_responses.write().insert(peer, txs);
    }
}

impl GossipHandle for LoopbackGossip {
    fn broadcast_block(&self, block: &Block) -> Result<()> {
        self.sent_blocks.lock().push(block.clone());
        Ok(())
    }

    fn broadcast_tx_block(&self, tx: &BlockTx) -> Result<()> {
        self.sent_tx_blocks.lock().push(tx.clone());
        Ok(())
    }

    fn broadcast_tx_validator(&self, tx: &ValidatorTx) -> Result<()> {
        self.sent_tx_validators.lock().push(tx.clone());
        Ok(())
    }

    fn request_validator_txs(&self, peer: PeerId) -> Result<Vec<ValidatorTx>> {
        Ok(self.validator_tx_responses.read().get(&peer).cloned().unwrap_or_default())
    }

    fn get_sessions_ids(&self, kind: SessionKind) -> Vec<PeerId> {
        self.peers_by_kind.read().get(&kind).cloned().unwrap_or_default()
    }
}

/// Bridges `State`'s outbound `Broadcaster` hook onto any [`GossipHandle`],
/// so `State` never has to know gossip exists.
pub struct GossipBroadcaster<G: GossipHandle> {
    gossip: Arc<G>,
}

impl<G: GossipHandle> GossipBroadcaster<G> {
    pub fn new(gossip: Arc<G>) -> Self {
        Self { gossip }
    }
}

impl<G: GossipHandle> blockchain_state::Broadcaster for GossipBroadcaster<G> {
    fn broadcast_tx_block(&self, tx: &BlockTx) {
        if let Err(err) = self.gossip.broadcast_tx_block(tx) {
            tracing::debug!(%err, "failed to gossip a user tx");
        }
    }

    fn broadcast_tx_validator(&self, tx: &ValidatorTx) {
        if let Err(err) = self.gossip.broadcast_tx_validator(tx) {
            tracing::debug!(%err, "failed to gossip a validator tx");
        }
    }

    fn broadcast_block(&self, block: &Block) {
        if let Err(err) = self.gossip.broadcast_block(block) {
            tracing::debug!(%err, "failed to gossip a finalized block");
        }
    }
}
