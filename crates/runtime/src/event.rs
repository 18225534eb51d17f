use blockchain_crypto::{Address, Hash};

/// A contract-emitted log entry (§4.7). Buffered per call frame; only
/// visible to the outside world once the root frame commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub address: Address,
    pub topics: Vec<Hash>,
    pub data: Vec<u8>,
    pub tx_hash: Hash,
    pub tx_index: u32,
    pub block_height: u64,
    pub log_index: u32,
}

impl Event {
    /// §4.7: at most 4 topics per event.
    pub const MAX_TOPICS: usize = 4;

    pub fn new(
        name: impl Into<String>,
        address: Address,
        topics: Vec<Hash>,
        data: Vec<u8>,
        tx_hash: Hash,
        tx_index: u32,
        block_height: u64,
        log_index: u32,
    ) -> Self {
        debug_assert!(topics.len() <= Self::MAX_TOPICS, "events allow at most 4 topics");
        Self {
            name: name.into(),
            address,
            topics,
            data,
            tx_hash,
            tx_index,
            block_height,
            log_index,
        }
    }
}
