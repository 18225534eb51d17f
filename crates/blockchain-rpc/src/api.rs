//! The JSON-RPC method surface (§6), implemented directly against
//! [`blockchain_state::State`] plus the [`EventIndex`] this crate keeps on
//! the side for receipts and logs. `RpcServer` (in `server.rs`) is the only
//! thing that talks HTTP; everything here is plain Rust a test can call
//! without a transport.

use crate::error::{Result, RpcError};
use crate::log_index::EventIndex;
use blockchain_core::tx::BlockTx;
use blockchain_crypto::{Address, Hash};
use blockchain_network::GossipHandle;
use blockchain_state::{ReceiptSink, State};
use blockchain_storage::KvStore;
use std::sync::Arc;

/// Gas a plain transfer costs; the only shape `estimateGas` can price
/// without actually running a call (§6).
pub const INTRINSIC_GAS: u64 = 21_000;

/// §6 `getCode`: returned for any address with a contract registered.
/// EOAs always get empty bytes instead.
const CONTRACT_CODE_SENTINEL: &[u8] = &[0xc0];

pub struct RpcApi<S: KvStore> {
    state: Arc<State<S>>,
    events: Arc<EventIndex>,
    gossip: Option<Arc<dyn GossipHandle>>,
    coinbase: Address,
    protocol_version: String,
}

/// A minimal receipt view; the JSON-RPC server layer serializes this.
#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    pub tx_hash: Hash,
    pub block_hash: Hash,
    pub block_number: u64,
    pub transaction_index: u32,
    pub from: Address,
    pub to: Address,
    pub success: bool,
}

impl<S: KvStore> RpcApi<S> {
    pub fn new(state: Arc<State<S>>, events: Arc<EventIndex>, coinbase: Address) -> Self {
        Self {
            state,
            events,
            gossip: None,
            coinbase,
            protocol_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_gossip(mut self, gossip: Arc<dyn GossipHandle>) -> Self {
        self.gossip = Some(gossip);
        self
    }

    /// Whoever drives `State::process_block` (the consensus worker loop, or
    /// a direct caller in tests) feeds the freshly applied block's receipt
    /// back in here so `getTransactionReceipt`/`getLogs` can see it.
    pub fn record_block(&self, block: &blockchain_core::Block, receipt: &blockchain_state::BlockReceipt) {
        self.events.record(block, receipt);
    }

    pub fn chain_id(&self) -> u32 {
        self.state.chain_id()
    }

    pub fn block_number(&self) -> Result<u64> {
        Ok(self.state.storage().latest_height()?)
    }

    pub fn get_block_by_hash(&self, hash: Hash) -> Result<blockchain_core::Block> {
        Ok(self.state.storage().get_by_hash(&hash)?)
    }

    pub fn get_block_by_number(&self, number: u64) -> Result<blockchain_core::Block> {
        Ok(self.state.storage().get_by_height(number)?)
    }

    pub fn get_block_transaction_count_by_hash(&self, hash: Hash) -> Result<usize> {
        Ok(self.get_block_by_hash(hash)?.user_txs.len())
    }

    pub fn get_block_transaction_count_by_number(&self, number: u64) -> Result<usize> {
        Ok(self.get_block_by_number(number)?.user_txs.len())
    }

    pub fn get_balance(&self, address: Address) -> u128 {
        self.state.balance(&address)
    }

    pub fn get_transaction_count(&self, address: Address) -> u64 {
        self.state.nonce(&address)
    }

    pub fn get_code(&self, address: Address) -> Vec<u8> {
        if self.state.contracts().is_deployed(&address) {
            CONTRACT_CODE_SENTINEL.to_vec()
        } else {
            Vec::new()
        }
    }

    pub fn get_transaction_by_hash(&self, tx_hash: Hash) -> Result<BlockTx> {
        let (tx, _block_hash, _index) = self.state.storage().get_tx(&tx_hash)?;
        Ok(tx)
    }

    pub fn get_transaction_by_block_hash_and_index(&self, block_hash: Hash, index: u32) -> Result<BlockTx> {
        let block = self.get_block_by_hash(block_hash)?;
        block
            .user_txs
            .get(index as usize)
            .cloned()
            .ok_or_else(|| RpcError::NotFound(format!("no transaction at index {index}")))
    }

    pub fn get_transaction_by_block_number_and_index(&self, number: u64, index: u32) -> Result<BlockTx> {
        let block = self.get_block_by_number(number)?;
        block
            .user_txs
            .get(index as usize)
            .cloned()
            .ok_or_else(|| RpcError::NotFound(format!("no transaction at index {index}")))
    }

    pub fn get_transaction_receipt(&self, tx_hash: Hash) -> Result<TransactionReceipt> {
        let (tx, block_hash, index) = self.state.storage().get_tx(&tx_hash)?;
        let block = self.get_block_by_hash(block_hash)?;
        let outcome = self
            .events
            .receipt_for(&tx_hash)
            .ok_or_else(|| RpcError::NotFound("no receipt recorded for this transaction".into()))?;
        Ok(TransactionReceipt {
            tx_hash,
            block_hash,
            block_number: block.header.height,
            transaction_index: index,
            from: tx.from,
            to: tx.to,
            success: outcome.success,
        })
    }

    /// §6 `sendRawTransaction`: decode the wire-encoded transaction and hand
    /// it to `State::addTx`.
    pub fn send_raw_transaction(&self, raw: &[u8]) -> Result<Hash> {
        let secp = secp256k1::Secp256k1::new();
        let tx = BlockTx::from_bytes(&secp, self.state.chain_id(), raw)
            .map_err(|err| RpcError::InvalidParams(err.to_string()))?;
        let hash = tx.hash();
        if let Err(err) = self.state.add_tx(tx) {
            tracing::debug!(%hash, %err, "rejected incoming raw transaction");
            return Err(err.into());
        }
        tracing::debug!(%hash, "accepted raw transaction into the mempool");
        Ok(hash)
    }

    pub fn call(&self, from: Address, to: Address, data: &[u8]) -> Result<Vec<u8>> {
        Ok(self.state.eth_call(from, to, data)?)
    }

    /// §6 `estimateGas`: only prices a call shape, never runs it. A plain
    /// transfer or a call to a known method always costs the intrinsic
    /// 21000; anything else (no selector, unknown selector, unknown
    /// contract) is an invalid-params error rather than a guess.
    pub fn estimate_gas(&self, to: Address, data: &[u8]) -> Result<u64> {
        if data.is_empty() {
            return Ok(INTRINSIC_GAS);
        }
        if data.len() < 4 {
            return Err(RpcError::InvalidParams("call data shorter than a selector".into()));
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[0..4]);
        match self.state.contracts().method_kind(&to, selector) {
            Some(_) => Ok(INTRINSIC_GAS),
            None => Err(RpcError::InvalidParams("unknown contract or method selector".into())),
        }
    }

    /// §6 `gasPrice`: this chain has no fee market, so the price is a fixed
    /// constant rather than derived from recent blocks.
    pub fn gas_price(&self) -> u128 {
        1
    }

    /// §6 `feeHistory`: with a constant gas price every bucket is identical;
    /// still shaped as a real history so callers don't special-case it.
    pub fn fee_history(&self, block_count: u64) -> Vec<u128> {
        vec![self.gas_price(); block_count.max(1) as usize]
    }

    pub fn get_logs(
        &self,
        from_block: Option<u64>,
        to_block: Option<u64>,
        address: Option<Address>,
    ) -> Vec<crate::log_index::IndexedEvent> {
        self.events.logs(from_block, to_block, address)
    }

    pub fn syncing(&self) -> bool {
        false
    }

    pub fn coinbase(&self) -> Address {
        self.coinbase
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn net_listening(&self) -> bool {
        self.gossip.is_some()
    }

    pub fn net_peer_count(&self) -> usize {
        match &self.gossip {
            Some(gossip) => gossip.get_sessions_ids(blockchain_network::SessionKind::Block).len(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bank::{selector, Bank};
    use blockchain_consensus::MIN_VALIDATORS;
    use blockchain_core::genesis::Genesis;
    use blockchain_core::tx::ValidatorSelector;
    use blockchain_storage::memory::MemoryStore;
    use runtime::ContractManager;
    use secp256k1::rand;
    use secp256k1::{Secp256k1, SecretKey};

    fn keypair() -> (SecretKey, Address) {
        let secp = Secp256k1::new();
        let sk = SecretKey::new(&mut rand::thread_rng());
        let pk = secp256k1::PublicKey::from_secret_key(&secp, &sk);
        (sk, Address::from_public_key(&pk))
    }

    fn genesis_with_validators(n: usize, balances: Vec<(Address, u128)>) -> (Genesis, Vec<SecretKey>) {
        let mut sks = Vec::new();
        let mut validators = Vec::new();
        for _ in 0..n {
            let (sk, addr) = keypair();
            sks.push(sk);
            validators.push(addr);
        }
        let genesis = Genesis {
            chain_id: 1,
            chain_owner: validators[0],
            genesis_balances: balances,
            validators,
            genesis_timestamp: 1,
            ws_port: 0,
            http_port: 0,
            discovery_nodes: vec![],
        };
        (genesis, sks)
    }

    fn build_round(state: &State<MemoryStore>, sks: &[SecretKey], validators: &[Address], height: u64) {
        let random_list = state.random_list();
        let committee = &random_list[1..=MIN_VALIDATORS];
        for (i, member) in committee.iter().enumerate() {
            let idx = validators.iter().position(|a| a == member).unwrap();
            let sk = &sks[idx];
            let seed = [i as u8 + 1; 32];
            let secp = Secp256k1::new();
            let hash_tx = blockchain_core::tx::ValidatorTx::sign(
                &secp,
                sk,
                ValidatorSelector::RandomHash,
                *blockchain_crypto::hash::keccak256(&seed).as_bytes(),
                state.chain_id(),
                height,
            );
            let seed_tx = blockchain_core::tx::ValidatorTx::sign(&secp, sk, ValidatorSelector::RandomSeed, seed, state.chain_id(), height);
            state.add_validator_tx(hash_tx).unwrap();
            state.add_validator_tx(seed_tx).unwrap();
        }
    }

    fn fresh_api(
        balances: Vec<(Address, u128)>,
    ) -> (RpcApi<MemoryStore>, Arc<State<MemoryStore>>, Vec<SecretKey>, Genesis, Arc<ContractManager>) {
        let (genesis, sks) = genesis_with_validators(MIN_VALIDATORS + 1, balances);
        let validators = genesis.validators.clone();
        let storage = Arc::new(blockchain_core::BlockStore::new(Arc::new(MemoryStore::new()), genesis.chain_id));
        let contracts = Arc::new(ContractManager::new());
        let state = Arc::new(State::new(&genesis, storage, contracts.clone()).unwrap());
        let coinbase = validators[0];
        let api = RpcApi::new(state.clone(), Arc::new(EventIndex::new()), coinbase);
        (api, state, sks, genesis, contracts)
    }

    #[test]
    fn chain_id_and_block_number_reflect_genesis() {
        let (api, _state, _sks, genesis, _contracts) = fresh_api(vec![]);
        assert_eq!(api.chain_id(), genesis.chain_id);
        assert_eq!(api.block_number().unwrap(), 0);
        assert!(!api.syncing());
    }

    #[test]
    fn send_raw_transaction_then_process_exposes_balance_and_receipt() {
        let (sender_sk, sender) = keypair();
        let (_, recipient) = keypair();
        let (api, state, sks, genesis, _contracts) = fresh_api(vec![(sender, 1_000_000)]);
        let validators = genesis.validators.clone();
        build_round(&state, &sks, &validators, 1);

        let secp = Secp256k1::new();
        let tx = BlockTx::sign(&secp, &sender_sk, recipient, vec![], genesis.chain_id, 0, 500, 1, 1, INTRINSIC_GAS);
        let tx_hash = api.send_raw_transaction(&tx.to_bytes()).unwrap();

        let producer = state.producer();
        let producer_idx = validators.iter().position(|a| a == &producer).unwrap();
        let block = state.assemble_block(&sks[producer_idx], 10).unwrap();
        state.validate_block(&block).unwrap();
        let receipt = state.process_block(&block).unwrap();
        api.record_block(&block, &receipt);

        assert_eq!(api.get_balance(recipient), 500);
        let view = api.get_transaction_receipt(tx_hash).unwrap();
        assert!(view.success);
        assert_eq!(view.from, sender);
        assert_eq!(view.to, recipient);
        assert!(api.get_logs(None, None, None).is_empty());
    }

    #[test]
    fn contract_call_produces_a_log_queryable_by_address() {
        let (sender_sk, sender) = keypair();
        let (api, state, sks, genesis, contracts) = fresh_api(vec![(sender, 1_000_000)]);
        let validators = genesis.validators.clone();
        let bank_addr = contracts.deploy(sender, Arc::new(Bank::new(sender, 6, sender)));
        build_round(&state, &sks, &validators, 1);

        let secp = Secp256k1::new();
        let mut data = selector::MINT_TO.to_vec();
        data.extend_from_slice(sender.as_bytes());
        data.extend_from_slice(&1000u128.to_be_bytes());
        let tx = BlockTx::sign(&secp, &sender_sk, bank_addr, data, genesis.chain_id, 0, 0, 1, 1, INTRINSIC_GAS);
        api.send_raw_transaction(&tx.to_bytes()).unwrap();

        let producer = state.producer();
        let producer_idx = validators.iter().position(|a| a == &producer).unwrap();
        let block = state.assemble_block(&sks[producer_idx], 10).unwrap();
        state.validate_block(&block).unwrap();
        let receipt = state.process_block(&block).unwrap();
        api.record_block(&block, &receipt);

        let logs = api.get_logs(None, None, Some(bank_addr));
        assert_eq!(logs.len(), 1);
        assert!(api.get_logs(None, None, Some(sender)).is_empty());
        assert_eq!(api.estimate_gas(bank_addr, &selector::MINT_TO).unwrap(), INTRINSIC_GAS);
        assert!(api.estimate_gas(bank_addr, &[0xff, 0xff, 0xff, 0xff]).is_err());
        assert_eq!(api.get_code(sender), Vec::<u8>::new());
        assert_eq!(api.get_code(bank_addr), CONTRACT_CODE_SENTINEL.to_vec());
    }
}
