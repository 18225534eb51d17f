//! A thin libp2p-backed [`GossipHandle`]. Swarm construction, transport
//! negotiation (noise/yamux over tcp) and the dial/event loop are out of
//! scope — only identity and topic setup are wired here; a real deployment
//! replaces [`LoopbackGossip`](crate::gossip::LoopbackGossip) with a fuller
//! version of this struct once that wiring is built.

use crate::error::{NetworkError, Result};
use crate::gossip::{GossipHandle, PeerId, SessionKind};
use blockchain_core::{Block, BlockTx, ValidatorTx};
use libp2p::gossipsub::IdentTopic;
use libp2p::identity::Keypair;

pub struct P2pGossip {
    local_keypair: Keypair,
    local_peer_id: libp2p::PeerId,
    block_topic: IdentTopic,
    tx_block_topic: IdentTopic,
    tx_validator_topic: IdentTopic,
}

impl P2pGossip {
    pub fn new() -> Self {
        let local_keypair = Keypair::generate_ed25519();
        let local_peer_id = libp2p::PeerId::from(local_keypair.public());
        Self {
            local_keypair,
            local_peer_id,
            block_topic: IdentTopic::new("blocks"),
            tx_block_topic: IdentTopic::new("tx-block"),
            tx_validator_topic: IdentTopic::new("tx-validator"),
        }
    }

    pub fn local_peer_id(&self) -> libp2p::PeerId {
        self.local_peer_id
    }

    pub fn keypair(&self) -> &Keypair {
        &self.local_keypair
    }
}

impl Default for P2pGossip {
    fn default() -> Self {
        Self::new()
    }
}

impl GossipHandle for P2pGossip {
    fn broadcast_block(&self, _block: &Block) -> Result<()> {
        let _ = &self.block_topic;
        Err(NetworkError::TransportNotWired)
    }

    fn broadcast_tx_block(&self, _tx: &BlockTx) -> Result<()> {
        let _ = &self.tx_block_topic;
        Err(NetworkError::TransportNotWired)
    }

    fn broadcast_tx_validator(&self, _tx: &ValidatorTx) -> Result<()> {
        let _ = &self.tx_validator_topic;
        Err(NetworkError::TransportNotWired)
    }

    fn request_validator_txs(&self, _peer: PeerId) -> Result<Vec<ValidatorTx>> {
        Err(NetworkError::TransportNotWired)
    }

    fn get_sessions_ids(&self, _kind: SessionKind) -> Vec<PeerId> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_peer_id_is_derived_from_the_generated_keypair() {
        let gossip = P2pGossip::new();
        assert_eq!(gossip.local_peer_id(), libp2p::PeerId::from(gossip.keypair().public()));
    }

    #[test]
    fn broadcast_without_a_wired_transport_is_explicit() {
        let gossip = P2pGossip::new();
        assert!(matches!(
            gossip.broadcast_tx_validator(&sample_tx()),
            Err(NetworkError::TransportNotWired)
        ));
    }

    fn sample_tx() -> ValidatorTx {
        use blockchain_core::tx::ValidatorSelector;
        use secp256k1::{rand, Secp256k1, SecretKey};
        let secp = Secp256k1::new();
        let sk = SecretKey::new(&mut rand::thread_rng());
        ValidatorTx::sign(&secp, &sk, ValidatorSelector::RandomHash, [1u8; 32], 1, 1)
    }
}
