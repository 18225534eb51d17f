//! In-memory event/receipt index (§6 `getLogs`, `getTransactionReceipt`).
//! `State::process_block` only returns a [`BlockReceipt`] for the block it
//! just applied; whoever drives block production feeds that receipt in
//! here so the RPC layer has something to query afterwards.

use blockchain_core::block::Block;
use blockchain_crypto::{Address, Hash};
use blockchain_state::{BlockReceipt, ReceiptSink, TxOutcome};
use runtime::Event;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct IndexedEvent {
    pub event: Event,
    pub block_hash: Hash,
}

#[derive(Default)]
pub struct EventIndex {
    by_tx: parking_lot::RwLock<HashMap<Hash, TxOutcome>>,
    events: parking_lot::RwLock<Vec<IndexedEvent>>,
}

impl EventIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receipt_for(&self, tx_hash: &Hash) -> Option<TxOutcome> {
        self.by_tx.read().get(tx_hash).cloned()
    }

    /// §6 `getLogs`: filter by inclusive block-height range and, if set, by
    /// emitting contract address.
    pub fn logs(&self, from_height: Option<u64>, to_height: Option<u64>, address: Option<Address>) -> Vec<IndexedEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| from_height.map(|h| e.event.block_height >= h).unwrap_or(true))
            .filter(|e| to_height.map(|h| e.event.block_height <= h).unwrap_or(true))
            .filter(|e| address.map(|a| e.event.address == a).unwrap_or(true))
            .cloned()
            .collect()
    }
}

impl ReceiptSink for EventIndex {
    fn record(&self, block: &Block, receipt: &BlockReceipt) {
        let block_hash = block.hash();
        let mut by_tx = self.by_tx.write();
        let mut events = self.events.write();
        for outcome in &receipt.outcomes {
            by_tx.insert(outcome.tx_hash, outcome.clone());
            for event in &outcome.events {
                events.push(IndexedEvent {
                    event: event.clone(),
                    block_hash,
                });
            }
        }
    }
}
