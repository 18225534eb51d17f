//! Adapts a local [`State`] into the [`ConsensusHost`] contract the
//! consensus worker loop drives (§4.9, §5). Remote peer delivery of
//! validator txs is left to whatever wires a `Broadcaster`/gossip layer on
//! top of this node; `fetch_validator_txs_from_peers` here is a no-op hook a
//! networked binary overrides by composing its own host instead.

use crate::state::State;
use blockchain_consensus::ConsensusHost;
use blockchain_core::tx::{ValidatorSelector, ValidatorTx};
use blockchain_crypto::Address;
use blockchain_storage::KvStore;
use secp256k1::rand::RngCore;
use secp256k1::{Secp256k1, SecretKey};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

pub struct LocalConsensusHost<S: KvStore> {
    state: Arc<State<S>>,
    secp: Secp256k1<secp256k1::All>,
    validator_sk: SecretKey,
    my_address: Address,
    max_user_txs_per_block: usize,
}

impl<S: KvStore> LocalConsensusHost<S> {
    pub fn new(state: Arc<State<S>>, validator_sk: SecretKey, my_address: Address) -> Self {
        Self {
            state,
            secp: Secp256k1::new(),
            validator_sk,
            my_address,
            max_user_txs_per_block: 4096,
        }
    }
}

impl<S: KvStore + 'static> ConsensusHost for LocalConsensusHost<S> {
    fn my_address(&self) -> Address {
        self.my_address
    }

    fn latest_height(&self) -> u64 {
        self.state.storage().latest_height().unwrap_or(0)
    }

    fn random_list(&self) -> Vec<Address> {
        self.state.random_list()
    }

    fn validator_mempool_count(&self, height: u64, selector: ValidatorSelector) -> usize {
        self.state.validator_mempool_count_at_selector(height, selector)
    }

    async fn fetch_validator_txs_from_peers(&self) {}

    fn submit_validator_tx(&self, tx: ValidatorTx) {
        if let Err(err) = self.state.add_validator_tx(tx) {
            tracing::debug!(%err, "validator tx rejected by this node's mempool");
        }
    }

    fn fresh_seed(&self) -> [u8; 32] {
        let mut seed = [0u8; 32];
        secp256k1::rand::thread_rng().fill_bytes(&mut seed);
        seed
    }

    fn build_commit_tx(&self, seed: [u8; 32], height: u64) -> ValidatorTx {
        self.state.inner.read().rdpos.build_commit_tx(&self.secp, &self.validator_sk, seed, height)
    }

    fn build_reveal_tx(&self, seed: [u8; 32], height: u64) -> ValidatorTx {
        self.state.inner.read().rdpos.build_reveal_tx(&self.secp, &self.validator_sk, seed, height)
    }

    async fn assemble_and_publish_block(&self) {
        let block = match self.state.assemble_block(&self.validator_sk, self.max_user_txs_per_block) {
            Ok(block) => block,
            Err(err) => {
                tracing::warn!(%err, "failed to assemble a block this round");
                return;
            }
        };
        if let Err(err) = self.state.validate_block(&block) {
            tracing::warn!(%err, "self-assembled block failed validation");
            return;
        }
        if let Err(err) = self.state.process_block(&block) {
            tracing::warn!(%err, "failed to apply self-assembled block");
        }
    }

    async fn wait_for_new_block(&self, after: u64, stop: &AtomicBool) {
        use std::sync::atomic::Ordering;
        while self.latest_height() <= after {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockchain_consensus::MIN_VALIDATORS;
    use blockchain_core::{BlockStore, Genesis};
    use blockchain_storage::memory::MemoryStore;
    use blockchain_core::tx::ValidatorSelector;
    use runtime::ContractManager;
    use secp256k1::rand;
    use std::sync::atomic::Ordering;
    use std::time::Duration as StdDuration;

    fn keypair() -> (SecretKey, Address) {
        let secp = Secp256k1::new();
        let sk = SecretKey::new(&mut rand::thread_rng());
        let pk = secp256k1::PublicKey::from_secret_key(&secp, &sk);
        (sk, Address::from_public_key(&pk))
    }

    fn fresh_state(n: usize) -> (Arc<State<MemoryStore>>, Vec<SecretKey>, Vec<Address>) {
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
            genesis_balances: vec![],
            validators: validators.clone(),
            genesis_timestamp: 1,
            ws_port: 0,
            http_port: 0,
            discovery_nodes: vec![],
        };
        let storage = Arc::new(BlockStore::new(Arc::new(MemoryStore::new()), genesis.chain_id));
        let contracts = Arc::new(ContractManager::new());
        let state = Arc::new(State::new(&genesis, storage, contracts).unwrap());
        (state, sks, validators)
    }

    fn produce_one_empty_block(state: &State<MemoryStore>, sks: &[SecretKey], validators: &[Address]) {
        let random_list = state.random_list();
        let committee = &random_list[1..=MIN_VALIDATORS];
        let secp = Secp256k1::new();
        for (i, member) in committee.iter().enumerate() {
            let idx = validators.iter().position(|a| a == member).unwrap();
            let sk = &sks[idx];
            let seed = [i as u8 + 1; 32];
            let hash_tx = ValidatorTx::sign(
                &secp,
                sk,
                ValidatorSelector::RandomHash,
                *blockchain_crypto::hash::keccak256(&seed).as_bytes(),
                state.chain_id(),
                1,
            );
            let seed_tx = ValidatorTx::sign(&secp, sk, ValidatorSelector::RandomSeed, seed, state.chain_id(), 1);
            state.add_validator_tx(hash_tx).unwrap();
            state.add_validator_tx(seed_tx).unwrap();
        }
        let producer = state.producer();
        let producer_idx = validators.iter().position(|a| a == &producer).unwrap();
        let block = state.assemble_block(&sks[producer_idx], 10).unwrap();
        state.validate_block(&block).unwrap();
        state.process_block(&block).unwrap();
    }

    #[tokio::test]
    async fn wait_for_new_block_returns_promptly_once_the_stop_flag_is_set() {
        let (state, sks, validators) = fresh_state(MIN_VALIDATORS + 1);
        let host = LocalConsensusHost::new(state, sks[0], validators[0]);
        let stop = AtomicBool::new(false);

        let stop_setter = async {
            tokio::time::sleep(StdDuration::from_millis(30)).await;
            stop.store(true, Ordering::Relaxed);
        };
        let waiter = host.wait_for_new_block(0, &stop);
        tokio::time::timeout(StdDuration::from_secs(2), async {
            tokio::join!(waiter, stop_setter);
        })
        .await
        .expect("wait_for_new_block must return once the stop flag is observed");
    }

    #[tokio::test]
    async fn wait_for_new_block_returns_once_the_height_advances() {
        let (state, sks, validators) = fresh_state(MIN_VALIDATORS + 1);
        let host = LocalConsensusHost::new(state.clone(), sks[0], validators[0]);
        let stop = AtomicBool::new(false);

        let producer_driver = async {
            tokio::time::sleep(StdDuration::from_millis(30)).await;
            produce_one_empty_block(&state, &sks, &validators);
        };
        let waiter = host.wait_for_new_block(0, &stop);
        tokio::time::timeout(StdDuration::from_secs(2), async {
            tokio::join!(waiter, producer_driver);
        })
        .await
        .expect("wait_for_new_block must return once the height advances");
        assert!(host.latest_height() >= 1);
    }
}
