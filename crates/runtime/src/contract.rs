//! The `Contract` trait (§4.7): every deployed contract is a selector
//! dispatch table plus a constructor, nothing more. The runtime owns
//! calling convention, journaling, and payable accounting; a `Contract`
//! impl only owns its own fields (via [`crate::Safe`]) and method bodies.

use crate::{CallContext, CallLogger, ContractManager, Result};
use blockchain_crypto::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Read-only; runs under a frame that rejects any `Safe::set`.
    View,
    /// May mutate state but must be called with zero attached value.
    NonPayable,
    /// May mutate state and receive native value, buffered into the
    /// contract's balance on commit.
    Payable,
}

pub trait Contract: Send + Sync {
    /// The account that deployed this contract; `OnlyOwner` methods check
    /// against this.
    fn owner(&self) -> Address;

    /// `None` means the selector is unknown to this contract
    /// (`RuntimeError::NoMethod`).
    fn method_kind(&self, selector: [u8; 4]) -> Option<MethodKind>;

    /// Run `selector` with raw ABI-decoded `args`, returning raw
    /// ABI-encoded return data. Implementations call into their own
    /// `Safe<T>` fields and `logger` to register mutations; they must
    /// not panic on malformed `args` and should return
    /// `RuntimeError::ContractExecution` instead.
    ///
    /// `manager` lets a handler make an internal call into another
    /// contract (`manager.call(...)`), reusing the same `logger` so the
    /// nested call shares one journal and one reentrancy chain.
    fn dispatch(
        &self,
        selector: [u8; 4],
        args: &[u8],
        ctx: &CallContext,
        logger: &mut CallLogger,
        manager: &ContractManager,
    ) -> Result<Vec<u8>>;
}
