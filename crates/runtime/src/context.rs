//! Per-call execution context (§4.7). The original contract runtime kept
//! "current block" state as mutable globals the dispatcher reached into;
//! here it is threaded explicitly as an immutable value so a `Contract`
//! handler can never observe a different block than the one it was
//! invoked under.

use blockchain_crypto::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// The externally-owned account that signed the top-level transaction.
    pub origin: Address,
    /// The immediate caller: equal to `origin` at the top level, or the
    /// calling contract's address for an internal call.
    pub caller: Address,
    /// The contract being invoked.
    pub address: Address,
    /// Native value attached to this call, already debited from the
    /// caller and buffered for the callee (§4.7 payable handling).
    pub value: u128,
    pub block_height: u64,
    pub block_timestamp: u64,
}

impl CallContext {
    pub fn top_level(origin: Address, address: Address, value: u128, block_height: u64, block_timestamp: u64) -> Self {
        Self {
            origin,
            caller: origin,
            address,
            value,
            block_height,
            block_timestamp,
        }
    }

    /// Derive the context for an internal call this contract makes into
    /// `callee`, carrying the same origin and block scope forward.
    pub fn call(&self, callee: Address, value: u128) -> Self {
        Self {
            origin: self.origin,
            caller: self.address,
            address: callee,
            value,
            block_height: self.block_height,
            block_timestamp: self.block_timestamp,
        }
    }
}
