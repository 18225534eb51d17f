//! rdPoS: the commit-reveal randomness pipeline and committee derivation
//! (§4.9). `RdPos` owns the fixed validator universe, the current
//! `randomList` ordering, the running `bestRandomSeed`, and the validator
//! mempool; `State` holds one instance behind its own lock (§5).

use crate::error::{ConsensusError, Result};
use crate::shuffle::shuffle;
use blockchain_core::mempool::ValidatorMempool;
use blockchain_core::tx::{ValidatorSelector, ValidatorTx};
use blockchain_crypto::hash::keccak256;
use blockchain_crypto::{Address, Hash};
use secp256k1::{Secp256k1, SecretKey};

/// Committee size per round; the validator set must be at least `2 *
/// MIN_VALIDATORS` so commit and reveal never overlap with the next
/// round's slots.
pub const MIN_VALIDATORS: usize = 4;

pub struct RdPos {
    validators: Vec<Address>,
    random_list: Vec<Address>,
    best_random_seed: Hash,
    chain_id: u32,
    validator_mempool: ValidatorMempool,
}

impl RdPos {
    pub fn new(validators: Vec<Address>, genesis_seed: Hash, chain_id: u32) -> Self {
        let random_list = shuffle(&validators, &genesis_seed);
        Self {
            validators,
            random_list,
            best_random_seed: genesis_seed,
            chain_id,
            validator_mempool: ValidatorMempool::new(),
        }
    }

    pub fn validators(&self) -> &[Address] {
        &self.validators
    }

    pub fn random_list(&self) -> &[Address] {
        &self.random_list
    }

    pub fn best_random_seed(&self) -> Hash {
        self.best_random_seed
    }

    pub fn producer(&self) -> Address {
        self.random_list[0]
    }

    /// Committee slots `1..=MIN_VALIDATORS`, ascending.
    pub fn committee(&self) -> &[Address] {
        &self.random_list[1..=MIN_VALIDATORS.min(self.random_list.len().saturating_sub(1))]
    }

    pub fn is_committee_member(&self, address: &Address) -> bool {
        self.committee().contains(address)
    }

    pub fn mempool(&self) -> &ValidatorMempool {
        &self.validator_mempool
    }

    pub fn mempool_mut(&mut self) -> &mut ValidatorMempool {
        &mut self.validator_mempool
    }

    pub fn next_height(&self, latest_height: u64) -> u64 {
        latest_height + 1
    }

    /// Assemble the current validator mempool into the canonical order a
    /// block requires (§4.9): all `randomHash` txs first, then all
    /// `randomSeed` txs, each sub-block ordered by committee slot. `None`
    /// if the mempool does not yet hold a complete round for `height`.
    pub fn ordered_validator_txs(&self, height: u64) -> Option<Vec<ValidatorTx>> {
        let committee = self.committee();
        let mut hashes = Vec::with_capacity(committee.len());
        for member in committee {
            let tx = self
                .validator_mempool
                .iter()
                .find(|tx| tx.height == height && tx.selector == ValidatorSelector::RandomHash && &tx.from == member)?
                .clone();
            hashes.push(tx);
        }
        let mut seeds = Vec::with_capacity(committee.len());
        for member in committee {
            let tx = self
                .validator_mempool
                .iter()
                .find(|tx| tx.height == height && tx.selector == ValidatorSelector::RandomSeed && &tx.from == member)?
                .clone();
            seeds.push(tx);
        }
        hashes.extend(seeds);
        Some(hashes)
    }

    /// Build and sign this node's commit tx for the round at `height`.
    pub fn build_commit_tx(&self, secp: &Secp256k1<secp256k1::All>, sk: &SecretKey, seed: [u8; 32], height: u64) -> ValidatorTx {
        let hash = *keccak256(&seed).as_bytes();
        ValidatorTx::sign(secp, sk, ValidatorSelector::RandomHash, hash, self.chain_id, height)
    }

    /// Build and sign this node's reveal tx, carrying the raw seed.
    pub fn build_reveal_tx(&self, secp: &Secp256k1<secp256k1::All>, sk: &SecretKey, seed: [u8; 32], height: u64) -> ValidatorTx {
        ValidatorTx::sign(secp, sk, ValidatorSelector::RandomSeed, seed, self.chain_id, height)
    }

    /// §4.9 block validation: validator-tx count, per-tx height, and the
    /// two-pass committee-ordering check grounded in the original's
    /// `rdpos.cpp` (paired hash/seed tx per committee slot, each signed by
    /// `randomList[slot]`).
    pub fn validate_validator_txs(&self, height: u64, txs: &[ValidatorTx]) -> Result<()> {
        let expected_count = 2 * MIN_VALIDATORS;
        if txs.len() != expected_count {
            return Err(ConsensusError::WrongValidatorCount {
                expected: expected_count,
                got: txs.len(),
            });
        }
        for tx in txs {
            if tx.height != height {
                return Err(ConsensusError::Chain(blockchain_core::ChainError::InvalidBlock(format!(
                    "validator tx height {} does not match block height {}",
                    tx.height, height
                ))));
            }
        }
        for i in 0..MIN_VALIDATORS {
            let hash_tx = &txs[i];
            let seed_tx = &txs[MIN_VALIDATORS + i];
            if hash_tx.selector != ValidatorSelector::RandomHash {
                return Err(ConsensusError::SelectorMismatch(i));
            }
            if seed_tx.selector != ValidatorSelector::RandomSeed {
                return Err(ConsensusError::SelectorMismatch(MIN_VALIDATORS + i));
            }
            let expected_signer = self.random_list[i + 1];
            if hash_tx.from != expected_signer {
                return Err(ConsensusError::WrongSigner {
                    slot: i + 1,
                    expected: expected_signer,
                    got: hash_tx.from,
                });
            }
            if seed_tx.from != expected_signer {
                return Err(ConsensusError::WrongSigner {
                    slot: i + 1,
                    expected: expected_signer,
                    got: seed_tx.from,
                });
            }
            if keccak256(&seed_tx.payload) != Hash::from_bytes(hash_tx.payload) {
                return Err(ConsensusError::HashMismatch(i + 1));
            }
        }
        Ok(())
    }

    /// §4.9 post-block advance: roll the seed forward, reshuffle the
    /// committee, and drop every pending validator tx.
    pub fn advance(&mut self, block_randomness: Hash) {
        self.best_random_seed = block_randomness;
        self.random_list = shuffle(&self.validators, &self.best_random_seed);
        self.validator_mempool.clear();
    }
}
