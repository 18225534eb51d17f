//! Contract registry and dispatcher (§4.7): `ContractManager.contractsMutex`
//! from §5 guards the registry; each call's journal travels separately as a
//! `CallLogger` so concurrent top-level calls never share frames.

use crate::contract::{Contract, MethodKind};
use crate::context::CallContext;
use crate::error::{Result, RuntimeError};
use crate::event::Event;
use crate::logger::CallLogger;
use blockchain_crypto::Address;
use std::collections::HashMap;
use std::sync::Arc;

/// A compiled-in contract type's constructor: ABI-decodes `args` and
/// returns a fresh instance, owned by `creator`.
pub type Constructor = dyn Fn(Address, &[u8]) -> Result<Arc<dyn Contract>> + Send + Sync;

/// The well-known address routed to the constructor registry instead of a
/// deployed contract instance (§4.7: "if absent, and `to == ContractManager`,
/// route to the constructor registry"). `keccak256("ContractManager")`
/// truncated to its first 20 bytes, the same reserved-address scheme the
/// protocol's other well-known contracts (e.g. the rdPoS sentinel) use.
pub const CONTRACT_MANAGER_ADDRESS: Address = Address([
    0x00, 0x01, 0xcb, 0x47, 0xea, 0x6d, 0x8b, 0x55, 0xfe, 0x44, 0xfd, 0xd6, 0xb1, 0xbd, 0xb5, 0x79, 0xef, 0xb4, 0x3e,
    0x61,
]);

pub struct ContractManager {
    contracts: parking_lot::RwLock<HashMap<Address, Arc<dyn Contract>>>,
    creation_nonces: parking_lot::Mutex<HashMap<Address, u64>>,
    constructors: parking_lot::RwLock<HashMap<[u8; 4], Arc<Constructor>>>,
}

/// Everything a successfully committed top-level call produced, ready to
/// be folded into the ledger and event log by the caller (`blockchain-state`).
pub struct CallOutcome {
    pub return_data: Vec<u8>,
    pub events: Vec<Event>,
    pub balance_deltas: Vec<(Address, i128)>,
    pub created_contracts: Vec<Address>,
}

impl ContractManager {
    pub fn new() -> Self {
        Self {
            contracts: parking_lot::RwLock::new(HashMap::new()),
            creation_nonces: parking_lot::Mutex::new(HashMap::new()),
            constructors: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, address: Address, contract: Arc<dyn Contract>) {
        self.contracts.write().insert(address, contract);
    }

    /// Register a compiled-in contract type's constructor under
    /// `type_selector`, reachable at runtime by sending a transaction to
    /// [`CONTRACT_MANAGER_ADDRESS`] with that selector (§4.7 constructor
    /// registry / factory). Distinct namespace from a deployed contract's
    /// own method selectors.
    pub fn register_constructor(
        &self,
        type_selector: [u8; 4],
        ctor: impl Fn(Address, &[u8]) -> Result<Arc<dyn Contract>> + Send + Sync + 'static,
    ) {
        self.constructors.write().insert(type_selector, Arc::new(ctor));
    }

    pub fn is_deployed(&self, address: &Address) -> bool {
        self.contracts.read().contains_key(address)
    }

    /// Derive the next contract address for `creator` (§3: address from
    /// `(creator, nonce)`) and register `contract` under it.
    pub fn deploy(&self, creator: Address, contract: Arc<dyn Contract>) -> Address {
        let mut nonces = self.creation_nonces.lock();
        let nonce = nonces.entry(creator).or_insert(0);
        let address = Address::from_creator(&creator, *nonce);
        *nonce += 1;
        drop(nonces);
        self.register(address, contract);
        address
    }

    /// Top-level entry point: runs `selector` at `to` as a brand-new call
    /// chain, committing and returning the accumulated outcome on success
    /// or reverting and propagating the error on failure.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_transaction(
        &self,
        origin: Address,
        to: Address,
        selector: [u8; 4],
        args: &[u8],
        value: u128,
        block_height: u64,
        block_timestamp: u64,
    ) -> Result<CallOutcome> {
        let ctx = CallContext::top_level(origin, to, value, block_height, block_timestamp);
        let mut logger = CallLogger::new();
        match self.call(to, selector, args, &ctx, &mut logger) {
            Ok(return_data) => {
                let committed = logger
                    .commit_frame()
                    .expect("execute_transaction commits the root frame");
                tracing::debug!(to = %to, selector = ?selector, events = committed.events.len(), "call committed");
                Ok(CallOutcome {
                    return_data,
                    events: committed.events,
                    balance_deltas: committed.balance_buffer,
                    created_contracts: committed.created_contracts,
                })
            }
            Err(err) => {
                logger.revert_frame();
                tracing::debug!(to = %to, selector = ?selector, error = %err, "call reverted");
                Err(err)
            }
        }
    }

    /// Read-only call: same dispatch path but forced into a view frame, so
    /// any attempted mutation fails instead of being silently dropped.
    pub fn execute_view(
        &self,
        origin: Address,
        to: Address,
        selector: [u8; 4],
        args: &[u8],
        block_height: u64,
        block_timestamp: u64,
    ) -> Result<Vec<u8>> {
        let ctx = CallContext::top_level(origin, to, 0, block_height, block_timestamp);
        let mut logger = CallLogger::new();
        logger.push_frame(true);
        let contract = self.lookup(&to)?;
        let kind = contract.method_kind(selector).ok_or(RuntimeError::NoMethod(selector))?;
        if kind != MethodKind::View {
            logger.revert_frame();
            return Err(RuntimeError::ReadOnlyViolation);
        }
        logger.enter_contract(to)?;
        let result = contract.dispatch(selector, args, &ctx, &mut logger, self);
        logger.exit_contract(&to);
        match result {
            Ok(data) => {
                logger.commit_frame();
                Ok(data)
            }
            Err(err) => {
                logger.revert_frame();
                Err(err)
            }
        }
    }

    /// Internal dispatch step, shared by top-level execution and
    /// contract-to-contract calls that reuse the caller's logger (§4.7).
    pub fn call(
        &self,
        to: Address,
        selector: [u8; 4],
        args: &[u8],
        ctx: &CallContext,
        logger: &mut CallLogger,
    ) -> Result<Vec<u8>> {
        if to == CONTRACT_MANAGER_ADDRESS {
            return self.dispatch_constructor(selector, args, ctx, logger);
        }
        let contract = self.lookup(&to)?;
        let kind = contract.method_kind(selector).ok_or(RuntimeError::NoMethod(selector))?;
        match kind {
            MethodKind::View => logger.push_frame(true),
            MethodKind::NonPayable => {
                if ctx.value != 0 {
                    return Err(RuntimeError::NotPayable);
                }
                logger.push_frame(false);
            }
            MethodKind::Payable => {
                logger.push_frame(false);
                if ctx.value != 0 {
                    logger.buffer_balance_delta(ctx.caller, -(ctx.value as i128));
                    logger.buffer_balance_delta(to, ctx.value as i128);
                }
            }
        }
        logger.enter_contract(to)?;
        let result = contract.dispatch(selector, args, ctx, logger, self);
        logger.exit_contract(&to);
        match result {
            Ok(data) => {
                logger.commit_frame();
                Ok(data)
            }
            Err(err) => {
                logger.revert_frame();
                Err(err)
            }
        }
    }

    /// Routes a call to [`CONTRACT_MANAGER_ADDRESS`]: `selector` names a
    /// registered contract type rather than a method, `args` are that
    /// type's ABI-encoded constructor arguments, and the new instance is
    /// deployed under `ctx.origin` the same way a genesis deployment is,
    /// returning its address as the call's return data.
    fn dispatch_constructor(
        &self,
        type_selector: [u8; 4],
        args: &[u8],
        ctx: &CallContext,
        logger: &mut CallLogger,
    ) -> Result<Vec<u8>> {
        if ctx.value != 0 {
            return Err(RuntimeError::NotPayable);
        }
        let ctor = self
            .constructors
            .read()
            .get(&type_selector)
            .cloned()
            .ok_or(RuntimeError::NoMethod(type_selector))?;
        logger.push_frame(false);
        let contract = match ctor(ctx.origin, args) {
            Ok(contract) => contract,
            Err(err) => {
                logger.revert_frame();
                return Err(err);
            }
        };
        let address = self.deploy(ctx.origin, contract);
        logger.record_created_contract(address);
        logger.commit_frame();
        Ok(address.as_bytes().to_vec())
    }

    /// Look up a deployed contract's declared kind for `selector` without
    /// running it; used by callers that need to validate a call shape
    /// up front (e.g. RPC `estimateGas`).
    pub fn method_kind(&self, address: &Address, selector: [u8; 4]) -> Option<MethodKind> {
        self.contracts.read().get(address)?.method_kind(selector)
    }

    fn lookup(&self, address: &Address) -> Result<Arc<dyn Contract>> {
        self.contracts
            .read()
            .get(address)
            .cloned()
            .ok_or(RuntimeError::NoContract)
    }
}

impl Default for ContractManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe::Safe;

    const GET: [u8; 4] = [0, 0, 0, 1];
    const INCREMENT: [u8; 4] = [0, 0, 0, 2];
    const DEPOSIT: [u8; 4] = [0, 0, 0, 3];
    const REENTER: [u8; 4] = [0, 0, 0, 4];
    const UNKNOWN: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

    struct Counter {
        owner: Address,
        value: Safe<u64>,
    }

    impl Contract for Counter {
        fn owner(&self) -> Address {
            self.owner
        }

        fn method_kind(&self, selector: [u8; 4]) -> Option<MethodKind> {
            match selector {
                GET => Some(MethodKind::View),
                INCREMENT => Some(MethodKind::NonPayable),
                DEPOSIT => Some(MethodKind::Payable),
                REENTER => Some(MethodKind::NonPayable),
                _ => None,
            }
        }

        fn dispatch(
            &self,
            selector: [u8; 4],
            _args: &[u8],
            ctx: &CallContext,
            logger: &mut CallLogger,
            manager: &ContractManager,
        ) -> Result<Vec<u8>> {
            match selector {
                GET => Ok(self.value.get().to_be_bytes().to_vec()),
                INCREMENT => {
                    let next = self.value.get() + 1;
                    self.value.set(next, logger)?;
                    Ok(vec![])
                }
                DEPOSIT => Ok(vec![]),
                REENTER => manager.call(ctx.address, INCREMENT, &[], ctx, logger),
                _ => Err(RuntimeError::NoMethod(selector)),
            }
        }
    }

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    #[test]
    fn nonpayable_increment_then_view_reads_new_value() {
        let manager = ContractManager::new();
        let owner = addr(1);
        let target = addr(2);
        manager.register(
            target,
            Arc::new(Counter {
                owner,
                value: Safe::new(0),
            }),
        );
        manager.execute_transaction(owner, target, INCREMENT, &[], 0, 1, 1).unwrap();
        let data = manager.execute_view(owner, target, GET, &[], 1, 1).unwrap();
        assert_eq!(u64::from_be_bytes(data.try_into().unwrap()), 1);
    }

    #[test]
    fn payable_call_buffers_symmetric_balance_delta() {
        let manager = ContractManager::new();
        let owner = addr(1);
        let target = addr(2);
        manager.register(
            target,
            Arc::new(Counter {
                owner,
                value: Safe::new(0),
            }),
        );
        let outcome = manager.execute_transaction(owner, target, DEPOSIT, &[], 100, 1, 1).unwrap();
        assert_eq!(outcome.balance_deltas, vec![(owner, -100), (target, 100)]);
    }

    #[test]
    fn nonpayable_with_value_is_rejected_and_reverted() {
        let manager = ContractManager::new();
        let owner = addr(1);
        let target = addr(2);
        manager.register(
            target,
            Arc::new(Counter {
                owner,
                value: Safe::new(0),
            }),
        );
        let result = manager.execute_transaction(owner, target, INCREMENT, &[], 5, 1, 1);
        assert_eq!(result.err(), Some(RuntimeError::NotPayable));
    }

    #[test]
    fn unknown_selector_is_no_method() {
        let manager = ContractManager::new();
        let owner = addr(1);
        let target = addr(2);
        manager.register(
            target,
            Arc::new(Counter {
                owner,
                value: Safe::new(0),
            }),
        );
        let result = manager.execute_transaction(owner, target, UNKNOWN, &[], 0, 1, 1);
        assert_eq!(result.err(), Some(RuntimeError::NoMethod(UNKNOWN)));
    }

    #[test]
    fn direct_self_reentrancy_is_rejected() {
        let manager = ContractManager::new();
        let owner = addr(1);
        let target = addr(2);
        manager.register(
            target,
            Arc::new(Counter {
                owner,
                value: Safe::new(0),
            }),
        );
        let result = manager.execute_transaction(owner, target, REENTER, &[], 0, 1, 1);
        assert!(matches!(result, Err(RuntimeError::Reentrancy(_))));
    }

    #[test]
    fn view_call_to_nonview_selector_is_rejected() {
        let manager = ContractManager::new();
        let owner = addr(1);
        let target = addr(2);
        manager.register(
            target,
            Arc::new(Counter {
                owner,
                value: Safe::new(0),
            }),
        );
        let result = manager.execute_view(owner, target, INCREMENT, &[], 1, 1);
        assert_eq!(result.err(), Some(RuntimeError::ReadOnlyViolation));
    }

    #[test]
    fn deploy_assigns_distinct_addresses_per_nonce() {
        let manager = ContractManager::new();
        let creator = addr(9);
        let owner = creator;
        let first = manager.deploy(
            creator,
            Arc::new(Counter {
                owner,
                value: Safe::new(0),
            }),
        );
        let second = manager.deploy(
            creator,
            Arc::new(Counter {
                owner,
                value: Safe::new(0),
            }),
        );
        assert_ne!(first, second);
        assert!(manager.is_deployed(&first));
        assert!(manager.is_deployed(&second));
    }
}
