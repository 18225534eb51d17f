//! Producer worker loop (§4.9, §5). The node's role each round is derived
//! purely from `randomList`; the worker itself only sequences the actions
//! and polls for the conditions each role waits on. It is generic over a
//! [`ConsensusHost`] so it can be driven by `blockchain-state`/
//! `blockchain-network` without those crates being a dependency here.

use crate::rdpos::MIN_VALIDATORS;
use blockchain_core::tx::{ValidatorSelector, ValidatorTx};
use blockchain_crypto::Address;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The role this node plays for the round currently observed at `latest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Committee,
    Bystander,
}

pub fn role_of(me: &Address, random_list: &[Address]) -> Role {
    if random_list.first() == Some(me) {
        Role::Producer
    } else if random_list[1..=MIN_VALIDATORS.min(random_list.len().saturating_sub(1))].contains(me) {
        Role::Committee
    } else {
        Role::Bystander
    }
}

/// Everything the worker needs from the rest of the node. `blockchain-state`
/// implements this over its `State`/gossip handles.
pub trait ConsensusHost: Send + Sync {
    fn my_address(&self) -> Address;
    fn latest_height(&self) -> u64;
    fn random_list(&self) -> Vec<Address>;
    fn validator_mempool_count(&self, height: u64, selector: ValidatorSelector) -> usize;
    async fn fetch_validator_txs_from_peers(&self);
    fn submit_validator_tx(&self, tx: ValidatorTx);
    fn fresh_seed(&self) -> [u8; 32];
    fn build_commit_tx(&self, seed: [u8; 32], height: u64) -> ValidatorTx;
    fn build_reveal_tx(&self, seed: [u8; 32], height: u64) -> ValidatorTx;
    /// Producer-only: assemble a block from the current mempools, sign it,
    /// and publish it. Returns once the new block is the node's own latest.
    async fn assemble_and_publish_block(&self);
    /// Blocks until `latest_height()` advances past `after`, or the stop
    /// flag fires first.
    async fn wait_for_new_block(&self, after: u64, stop: &AtomicBool);
}

const POLL_INTERVAL: Duration = Duration::from_micros(500);

/// Run one full round: determine role, act, then wait for the next block.
/// Returns `false` once `stop` is observed, so the caller's loop can exit.
pub async fn run_round<H: ConsensusHost + ?Sized>(host: &H, stop: &Arc<AtomicBool>) -> bool {
    if stop.load(Ordering::Relaxed) {
        return false;
    }
    let latest = host.latest_height();
    let height = latest + 1;
    let list = host.random_list();
    let me = host.my_address();
    match role_of(&me, &list) {
        Role::Producer => {
            while host.validator_mempool_count(height, ValidatorSelector::RandomHash) < MIN_VALIDATORS
                || host.validator_mempool_count(height, ValidatorSelector::RandomSeed) < MIN_VALIDATORS
            {
                if stop.load(Ordering::Relaxed) {
                    return false;
                }
                host.fetch_validator_txs_from_peers().await;
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            host.assemble_and_publish_block().await;
        }
        Role::Committee => {
            let seed = host.fresh_seed();
            let commit = host.build_commit_tx(seed, height);
            host.submit_validator_tx(commit);
            // Wait for minValidators randomHash commitments specifically, so
            // every committee member has locked in a commitment before this
            // node reveals its own seed.
            while host.validator_mempool_count(height, ValidatorSelector::RandomHash) < MIN_VALIDATORS {
                if stop.load(Ordering::Relaxed) {
                    return false;
                }
                host.fetch_validator_txs_from_peers().await;
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            let reveal = host.build_reveal_tx(seed, height);
            host.submit_validator_tx(reveal);
        }
        Role::Bystander => {}
    }
    host.wait_for_new_block(latest, stop).await;
    !stop.load(Ordering::Relaxed)
}

/// The long-lived consensus task (§5): loops `run_round` until `stop` is
/// set, checking the flag on every sleep and every peer request as
/// required by the cancellation contract.
pub async fn run<H: ConsensusHost + ?Sized>(host: &H, stop: Arc<AtomicBool>) {
    while run_round(host, &stop).await {}
    tracing::info!("consensus worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(n: u8) -> Vec<Address> {
        (0..n).map(|i| Address::from_bytes([i; 20])).collect()
    }

    #[test]
    fn producer_is_first_in_random_list() {
        let list = addrs(6);
        assert_eq!(role_of(&list[0], &list), Role::Producer);
    }

    #[test]
    fn committee_covers_slots_one_through_min_validators() {
        let list = addrs(6);
        assert_eq!(role_of(&list[1], &list), Role::Committee);
        assert_eq!(role_of(&list[MIN_VALIDATORS], &list), Role::Committee);
    }

    #[test]
    fn beyond_committee_is_bystander() {
        let list = addrs(6);
        assert_eq!(role_of(&list[5], &list), Role::Bystander);
    }
}
