//! Genesis inputs (§6): the configuration a node is bootstrapped from.
//! Loaded from disk by the CLI crate; this struct is the parsed shape.

use crate::block::{Block, BlockHeader};
use crate::ledger::Ledger;
use blockchain_crypto::{Address, Hash};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genesis {
    pub chain_id: u32,
    pub chain_owner: Address,
    pub genesis_balances: Vec<(Address, u128)>,
    pub validators: Vec<Address>,
    /// Microseconds since epoch.
    pub genesis_timestamp: u64,
    pub ws_port: u16,
    pub http_port: u16,
    #[serde(default)]
    pub discovery_nodes: Vec<String>,
}

impl Genesis {
    /// Build the genesis ledger by crediting every configured balance.
    pub fn build_ledger(&self) -> Ledger {
        let mut ledger = Ledger::new();
        for (addr, amount) in &self.genesis_balances {
            ledger.credit(*addr, *amount);
        }
        ledger
    }

    /// The synthetic height-0 block. It is unsigned (no producer exists
    /// before the randomness pipeline has run once) and carries no
    /// transactions; its hash seeds `prevHash` for height 1.
    pub fn genesis_block_header(&self) -> BlockHeader {
        BlockHeader {
            prev_hash: Hash::zero(),
            block_randomness: Hash::zero(),
            validator_merkle_root: Hash::zero(),
            tx_merkle_root: Hash::zero(),
            timestamp: self.genesis_timestamp,
            height: 0,
        }
    }

    pub fn genesis_hash(&self) -> Hash {
        self.genesis_block_header().hash()
    }
}

/// The height-0 placeholder persisted to storage so `Storage::latest()`
/// always has a well-defined predecessor, mirrored across `Block`'s normal
/// shape with an all-zero signature (never independently verified; height 1
/// validation only ever checks `prevHash` and `timestamp` against it).
pub fn genesis_record(genesis: &Genesis) -> Block {
    use blockchain_crypto::signature::Signature;
    Block {
        header: genesis.genesis_block_header(),
        user_txs: Vec::new(),
        validator_txs: Vec::new(),
        signature: Signature {
            r: [0u8; 32],
            s: [0u8; 32],
            v: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_ledger_credits_every_balance() {
        let genesis = Genesis {
            chain_id: 1,
            chain_owner: Address::from_bytes([1u8; 20]),
            genesis_balances: vec![
                (Address::from_bytes([1u8; 20]), 100),
                (Address::from_bytes([2u8; 20]), 200),
            ],
            validators: vec![],
            genesis_timestamp: 1,
            ws_port: 8080,
            http_port: 8081,
            discovery_nodes: vec![],
        };
        let ledger = genesis.build_ledger();
        assert_eq!(ledger.get_balance(&Address::from_bytes([1u8; 20])), 100);
        assert_eq!(ledger.get_balance(&Address::from_bytes([2u8; 20])), 200);
    }
}
