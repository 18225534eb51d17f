//! The transition function (§4.8): the sole owner of ledger mutation,
//! wrapping the user mempool and the rdPoS wrapper behind one lock so the
//! two never observe each other's half-applied state (§5's
//! `State.stateMutex`).

use crate::error::{Result, StateError};
use blockchain_consensus::RdPos;
use blockchain_core::block::{Block, MutableBlock};
use blockchain_core::genesis::{genesis_record, Genesis};
use blockchain_core::mempool::UserMempool;
use blockchain_core::tx::{BlockTx, ValidatorSelector, ValidatorTx};
use blockchain_core::{BlockStore, Ledger};
use blockchain_crypto::Address;
use blockchain_storage::KvStore;
use runtime::{ContractManager, Event};
use secp256k1::{Secp256k1, SecretKey};
use std::sync::Arc;

/// Outbound gossip hook (§6's gossip substrate, consumed side). Wiring a
/// concrete `blockchain-network` implementation is the node binary's job;
/// `State` only needs somewhere to report new txs/blocks.
pub trait Broadcaster: Send + Sync {
    fn broadcast_tx_block(&self, _tx: &BlockTx) {}
    fn broadcast_tx_validator(&self, _tx: &ValidatorTx) {}
    fn broadcast_block(&self, _block: &Block) {}
}

pub struct NullBroadcaster;
impl Broadcaster for NullBroadcaster {}

/// Observes every block this node applies, alongside its [`BlockReceipt`]
/// (§6 `getLogs`/`getTransactionReceipt`). `State` computes the receipt once
/// in `process_block` and forgets it immediately after; anything that needs
/// to query it later (the RPC layer's event index) hooks in here instead of
/// `State` retaining history it has no other use for.
pub trait ReceiptSink: Send + Sync {
    fn record(&self, _block: &Block, _receipt: &BlockReceipt) {}
}

pub struct NullReceiptSink;
impl ReceiptSink for NullReceiptSink {}

/// Per-tx outcome of applying a block: whether the tx's call (if any)
/// committed, and the events it emitted. Plain transfers and successful
/// calls are always `success`; a reverted call still pays gas but emits no
/// events and is reported as a failure (§4.8, §6 `getTransactionReceipt`).
#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub tx_hash: blockchain_crypto::Hash,
    pub success: bool,
    pub events: Vec<Event>,
}

/// Everything a processed block produced that isn't already captured by the
/// ledger. The RPC layer's event/receipt index builds on this.
#[derive(Debug, Default)]
pub struct BlockReceipt {
    pub outcomes: Vec<TxOutcome>,
}

impl BlockReceipt {
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.outcomes.iter().flat_map(|o| o.events.iter())
    }
}

pub(crate) struct Inner {
    pub(crate) ledger: Ledger,
    pub(crate) user_mempool: UserMempool,
    pub(crate) rdpos: RdPos,
}

pub struct State<S: KvStore> {
    chain_id: u32,
    secp: Secp256k1<secp256k1::All>,
    storage: Arc<BlockStore<S>>,
    contracts: Arc<ContractManager>,
    broadcaster: Arc<dyn Broadcaster>,
    receipt_sink: Arc<dyn ReceiptSink>,
    pub(crate) inner: parking_lot::RwLock<Inner>,
}

impl<S: KvStore> State<S> {
    pub fn new(genesis: &Genesis, storage: Arc<BlockStore<S>>, contracts: Arc<ContractManager>) -> Result<Self> {
        Self::with_broadcaster(genesis, storage, contracts, Arc::new(NullBroadcaster))
    }

    pub fn with_broadcaster(
        genesis: &Genesis,
        storage: Arc<BlockStore<S>>,
        contracts: Arc<ContractManager>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Result<Self> {
        Self::with_broadcaster_and_sink(genesis, storage, contracts, broadcaster, Arc::new(NullReceiptSink))
    }

    pub fn with_broadcaster_and_sink(
        genesis: &Genesis,
        storage: Arc<BlockStore<S>>,
        contracts: Arc<ContractManager>,
        broadcaster: Arc<dyn Broadcaster>,
        receipt_sink: Arc<dyn ReceiptSink>,
    ) -> Result<Self> {
        if storage.latest_height().is_err() {
            storage.append(&genesis_record(genesis))?;
        }
        let mut ledger = genesis.build_ledger();
        let mut rdpos = RdPos::new(genesis.validators.clone(), genesis.genesis_hash(), genesis.chain_id);

        // A restart against a backing store that already holds blocks beyond
        // genesis: rebuild the ledger, contract registry, and rdPoS schedule
        // by replaying every persisted block in order instead of silently
        // resetting to genesis values while believing the node is caught up.
        let latest_height = storage.latest_height().unwrap_or(0);
        if latest_height > 0 {
            tracing::info!(height = latest_height, "replaying persisted chain to rebuild ledger/contract/rdPoS state");
            for height in 1..=latest_height {
                let block = storage.get_by_height(height)?;
                apply_block_txs(&contracts, &mut ledger, &block);
                rdpos.advance(block.header.block_randomness);
            }
        }
        Ok(Self {
            chain_id: genesis.chain_id,
            secp: Secp256k1::new(),
            storage,
            contracts,
            broadcaster,
            receipt_sink,
            inner: parking_lot::RwLock::new(Inner {
                ledger,
                user_mempool: UserMempool::new(),
                rdpos,
            }),
        })
    }

    pub fn chain_id(&self) -> u32 {
        self.chain_id
    }

    pub fn storage(&self) -> &Arc<BlockStore<S>> {
        &self.storage
    }

    pub fn contracts(&self) -> &Arc<ContractManager> {
        &self.contracts
    }

    pub fn balance(&self, addr: &Address) -> u128 {
        self.inner.read().ledger.get_balance(addr)
    }

    pub fn nonce(&self, addr: &Address) -> u64 {
        self.inner.read().ledger.get_nonce(addr)
    }

    pub fn random_list(&self) -> Vec<Address> {
        self.inner.read().rdpos.random_list().to_vec()
    }

    pub fn producer(&self) -> Address {
        self.inner.read().rdpos.producer()
    }

    /// §4.8 `validateTransaction`: pure, no mutation.
    pub fn validate_transaction(&self, tx: &BlockTx) -> Result<()> {
        let inner = self.inner.read();
        inner.user_mempool.validate(tx, &inner.ledger)?;
        Ok(())
    }

    /// §4.8 `addTx`: validate, admit into the user mempool, broadcast.
    pub fn add_tx(&self, tx: BlockTx) -> Result<()> {
        {
            let mut inner = self.inner.write();
            inner.user_mempool.validate(&tx, &inner.ledger)?;
            inner.user_mempool.insert(tx.clone());
        }
        self.broadcaster.broadcast_tx_block(&tx);
        Ok(())
    }

    pub fn add_validator_tx(&self, tx: ValidatorTx) -> Result<()> {
        {
            let mut inner = self.inner.write();
            let committee = inner.rdpos.committee().to_vec();
            let expected_height = inner.rdpos.next_height(self.storage.latest_height().unwrap_or(0));
            inner.rdpos.mempool().validate(&tx, &committee, expected_height)?;
            inner.rdpos.mempool_mut().insert(tx.clone());
        }
        self.broadcaster.broadcast_tx_validator(&tx);
        Ok(())
    }

    /// Assemble validator txs from the mempool in canonical order, if a
    /// complete round is present for `height`.
    pub fn ordered_validator_txs(&self, height: u64) -> Option<Vec<ValidatorTx>> {
        self.inner.read().rdpos.ordered_validator_txs(height)
    }

    pub fn validator_mempool_count_at(&self, height: u64) -> usize {
        self.inner.read().rdpos.mempool().iter().filter(|tx| tx.height == height).count()
    }

    /// Like [`Self::validator_mempool_count_at`] but scoped to a single
    /// selector (`randomHash` vs `randomSeed`), so a caller can confirm a
    /// commit-before-reveal precondition instead of counting both kinds of
    /// validator tx together.
    pub fn validator_mempool_count_at_selector(&self, height: u64, selector: ValidatorSelector) -> usize {
        self.inner
            .read()
            .rdpos
            .mempool()
            .iter()
            .filter(|tx| tx.height == height && tx.selector == selector)
            .count()
    }

    /// §4.8 `validateBlock`.
    pub fn validate_block(&self, block: &Block) -> Result<()> {
        let latest = self.storage.latest()?;
        if block.header.height != latest.header.height + 1 {
            return Err(StateError::InvalidBlock(format!(
                "expected height {}, got {}",
                latest.header.height + 1,
                block.header.height
            )));
        }
        if block.header.prev_hash != latest.hash() {
            return Err(StateError::InvalidBlock("prev_hash does not match the current tip".into()));
        }
        if block.header.timestamp <= latest.header.timestamp {
            return Err(StateError::InvalidBlock("timestamp does not strictly advance".into()));
        }
        block.check_integrity()?;
        let (producer, _) = block.recover_producer(&self.secp)?;

        let inner = self.inner.read();
        if producer != inner.rdpos.producer() {
            return Err(StateError::InvalidBlock("block signer is not the expected producer".into()));
        }
        inner.rdpos.validate_validator_txs(block.header.height, &block.validator_txs)?;

        let mut scratch = inner.ledger.clone();
        for tx in &block.user_txs {
            let ledger_nonce = scratch.get_nonce(&tx.from);
            if tx.nonce != ledger_nonce {
                return Err(StateError::InvalidBlock(format!(
                    "tx from {} has nonce {}, expected {}",
                    tx.from, tx.nonce, ledger_nonce
                )));
            }
            let balance = scratch.get_balance(&tx.from);
            let required = tx.max_cost();
            if balance < required {
                return Err(StateError::InvalidBlock(format!(
                    "tx from {} needs {} but only has {}",
                    tx.from, required, balance
                )));
            }
            let _ = scratch.debit(tx.from, required);
            scratch.increment_nonce(tx.from);
        }
        Ok(())
    }

    /// §4.8 `processBlock`: apply every user tx in order, append to
    /// storage, refresh mempools, advance rdPoS.
    pub fn process_block(&self, block: &Block) -> Result<BlockReceipt> {
        let mut inner = self.inner.write();
        let receipt = apply_block_txs(&self.contracts, &mut inner.ledger, block);
        let included: Vec<_> = receipt.outcomes.iter().map(|o| o.tx_hash).collect();

        self.storage.append(block)?;
        inner.user_mempool.prune(&included, &inner.ledger);
        inner.rdpos.advance(block.header.block_randomness);
        self.broadcaster.broadcast_block(block);
        self.receipt_sink.record(block, &receipt);
        Ok(receipt)
    }

    /// §4.8 `ethCall`: a read-only call under a frame that rejects any
    /// mutation.
    pub fn eth_call(&self, from: Address, to: Address, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < 4 {
            return Err(runtime::RuntimeError::ContractExecution("call data must carry a 4-byte selector".into()).into());
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[0..4]);
        let args = &data[4..];
        let latest = self.storage.latest()?;
        let result = self
            .contracts
            .execute_view(from, to, selector, args, latest.header.height, latest.header.timestamp)?;
        Ok(result)
    }

    /// Assemble a fresh block from the current mempools (producer role,
    /// §4.9 worker step 1). Caller signs with its own validator key.
    pub fn assemble_block(&self, producer_sk: &SecretKey, max_user_txs: usize) -> Result<Block> {
        let latest = self.storage.latest()?;
        let height = latest.header.height + 1;
        let inner = self.inner.read();
        let validator_txs = inner
            .rdpos
            .ordered_validator_txs(height)
            .ok_or_else(|| StateError::InvalidBlock("validator mempool round is incomplete".into()))?;
        let user_txs: Vec<BlockTx> = inner.user_mempool.iter().take(max_user_txs).cloned().collect();
        drop(inner);

        let timestamp = latest.header.timestamp + 1;
        let mut block = MutableBlock::new(latest.hash(), height, timestamp);
        block.user_txs = user_txs;
        block.validator_txs = validator_txs;
        Ok(block.finalize(&self.secp, producer_sk, latest.header.timestamp)?)
    }
}

/// Apply every user tx in `block` to `ledger`/`contracts` in order, the core
/// of `processBlock` (§4.8). Shared between live block application and
/// restart-time replay of a persisted chain, so both reconstruct identical
/// ledger and contract state from the same sequence of transactions.
fn apply_block_txs(contracts: &ContractManager, ledger: &mut Ledger, block: &Block) -> BlockReceipt {
    let mut receipt = BlockReceipt::default();

    for tx in &block.user_txs {
        let tx_hash = tx.hash();
        let gas_cost = (tx.gas_limit as u128).saturating_mul(tx.max_fee_per_gas);
        let is_contract_call = tx.data.len() >= 4 && contracts.is_deployed(&tx.to);

        if is_contract_call {
            if ledger.debit(tx.from, gas_cost).is_err() {
                tracing::warn!(from = %tx.from, "insufficient balance to cover gas at block application time");
                ledger.increment_nonce(tx.from);
                receipt.outcomes.push(TxOutcome {
                    tx_hash,
                    success: false,
                    events: Vec::new(),
                });
                continue;
            }
            let mut selector = [0u8; 4];
            selector.copy_from_slice(&tx.data[0..4]);
            let args = &tx.data[4..];
            match contracts.execute_transaction(
                tx.from,
                tx.to,
                selector,
                args,
                tx.value,
                block.header.height,
                block.header.timestamp,
            ) {
                Ok(outcome) => {
                    for (addr, delta) in &outcome.balance_deltas {
                        apply_delta(ledger, *addr, *delta);
                    }
                    receipt.outcomes.push(TxOutcome {
                        tx_hash,
                        success: true,
                        events: outcome.events,
                    });
                }
                Err(err) => {
                    tracing::debug!(from = %tx.from, to = %tx.to, %err, "contract call reverted during block application");
                    receipt.outcomes.push(TxOutcome {
                        tx_hash,
                        success: false,
                        events: Vec::new(),
                    });
                }
            }
        } else {
            let total = gas_cost.saturating_add(tx.value);
            let success = ledger.debit(tx.from, total).is_ok();
            if success {
                ledger.credit(tx.to, tx.value);
            } else {
                tracing::warn!(from = %tx.from, "insufficient balance for plain transfer at block application time");
            }
            receipt.outcomes.push(TxOutcome {
                tx_hash,
                success,
                events: Vec::new(),
            });
        }
        ledger.increment_nonce(tx.from);
    }

    receipt
}

fn apply_delta(ledger: &mut Ledger, addr: Address, delta: i128) {
    if delta >= 0 {
        ledger.credit(addr, delta as u128);
    } else {
        let amount = (-delta) as u128;
        let _ = ledger.debit(addr, amount);
    }
}
