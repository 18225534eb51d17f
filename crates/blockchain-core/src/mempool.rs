//! Two unordered queues (§4.5): user transactions scoped to ledger state,
//! validator transactions scoped to the current consensus round. Ordering
//! is imposed only at block construction.

use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::tx::{BlockTx, ValidatorSelector, ValidatorTx};
use blockchain_crypto::{Address, Hash};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct UserMempool {
    txs: HashMap<Hash, BlockTx>,
}

impl UserMempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.txs.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&BlockTx> {
        self.txs.get(hash)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockTx> {
        self.txs.values()
    }

    /// §4.5 admission rule: valid signature/chain-id (assumed already
    /// checked by the caller, since that requires a secp256k1 context),
    /// `nonce == ledgerNonce` or `nonce > ledgerNonce` with no existing
    /// same-nonce tx from the sender, and sufficient balance for
    /// `gasLimit*maxFeePerGas + value`.
    pub fn validate(&self, tx: &BlockTx, ledger: &Ledger) -> Result<(), ChainError> {
        let hash = tx.hash();
        if self.txs.contains_key(&hash) {
            return Err(ChainError::Duplicate);
        }
        let ledger_nonce = ledger.get_nonce(&tx.from);
        if tx.nonce < ledger_nonce {
            return Err(ChainError::InvalidNonce {
                expected: ledger_nonce,
                got: tx.nonce,
            });
        }
        if tx.nonce > ledger_nonce && self.has_same_nonce(&tx.from, tx.nonce) {
            return Err(ChainError::InvalidNonce {
                expected: ledger_nonce,
                got: tx.nonce,
            });
        }
        let balance = ledger.get_balance(&tx.from);
        let required = tx.max_cost();
        if balance < required {
            return Err(ChainError::InsufficientBalance {
                available: balance,
                required,
            });
        }
        Ok(())
    }

    pub fn insert(&mut self, tx: BlockTx) {
        let hash = tx.hash();
        tracing::debug!(%hash, from = %tx.from, nonce = tx.nonce, "admitted user tx to mempool");
        self.txs.insert(hash, tx);
    }

    pub fn remove(&mut self, hash: &Hash) -> Option<BlockTx> {
        self.txs.remove(hash)
    }

    fn has_same_nonce(&self, from: &Address, nonce: u64) -> bool {
        self.txs
            .values()
            .any(|tx| &tx.from == from && tx.nonce == nonce)
    }

    /// After a block is applied: drop included txs, then drop every
    /// remaining tx that no longer validates against the post-block ledger
    /// (stale nonce or insufficient balance; duplicate-in-pool is moot here
    /// since every surviving tx is already unique by hash).
    pub fn prune(&mut self, included: &[Hash], ledger: &Ledger) {
        for hash in included {
            self.txs.remove(hash);
        }
        let before = self.txs.len();
        self.txs.retain(|_, tx| {
            let ledger_nonce = ledger.get_nonce(&tx.from);
            tx.nonce >= ledger_nonce && ledger.get_balance(&tx.from) >= tx.max_cost()
        });
        let evicted = before - self.txs.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.txs.len(), "evicted stale user txs after block");
        }
    }
}

#[derive(Debug, Default)]
pub struct ValidatorMempool {
    txs: HashMap<Hash, ValidatorTx>,
}

impl ValidatorMempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidatorTx> {
        self.txs.values()
    }

    pub fn count_for(&self, sender: &Address, selector: ValidatorSelector) -> usize {
        self.txs
            .values()
            .filter(|tx| &tx.from == sender && tx.selector == selector)
            .count()
    }

    /// §4.5: sender must be in the current committee, `height` must be
    /// `latest height + 1`, and at most one randomHash plus one randomSeed
    /// per sender per height.
    pub fn validate(
        &self,
        tx: &ValidatorTx,
        committee: &[Address],
        expected_height: u64,
    ) -> Result<(), ChainError> {
        if !committee.contains(&tx.from) {
            return Err(ChainError::InvalidBlock(format!(
                "{} is not a member of the current committee",
                tx.from
            )));
        }
        if tx.height != expected_height {
            return Err(ChainError::InvalidBlock(format!(
                "validator tx height {} does not match expected height {}",
                tx.height, expected_height
            )));
        }
        if self.count_for(&tx.from, tx.selector) >= 1 {
            return Err(ChainError::Duplicate);
        }
        Ok(())
    }

    pub fn insert(&mut self, tx: ValidatorTx) {
        tracing::debug!(from = %tx.from, height = tx.height, selector = ?tx.selector, "admitted validator tx to mempool");
        self.txs.insert(tx.hash(), tx);
    }

    /// Cleared entirely after every accepted block (§4.5).
    pub fn clear(&mut self) {
        if !self.txs.is_empty() {
            tracing::debug!(evicted = self.txs.len(), "cleared validator mempool for next round");
        }
        self.txs.clear();
    }
}
