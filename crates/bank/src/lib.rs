//! `Bank`: the one concrete protocol contract registered at genesis, a
//! simple token ledger built on `runtime::Safe`/`SafeMap`. Adapted from
//! an SPL-style mint/token-account pair (`Mint { decimals, supply,
//! mint_authority }`, `TokenAccount { owner, amount, mint }`) into this
//! runtime's selector-dispatch/event model: one `Bank` instance per
//! deployed mint, its own balances keyed by holder address instead of a
//! separate per-holder account record.

mod error;

pub use error::BankError;

use blockchain_crypto::{Address, Hash};
use runtime::{
    CallContext, CallLogger, Contract, ContractManager, MethodKind, Result as RuntimeResult, RuntimeError, Safe,
    SafeMap,
};

/// `selector` values are assigned densely in declaration order; unlike
/// `blockchain-core`'s rdPoS selectors these have no external origin to
/// match, so there is nothing to derive them from.
pub mod selector {
    pub const MINT_TO: [u8; 4] = [0x00, 0x00, 0x00, 0x01];
    pub const TRANSFER: [u8; 4] = [0x00, 0x00, 0x00, 0x02];
    pub const BURN: [u8; 4] = [0x00, 0x00, 0x00, 0x03];
    pub const BALANCE_OF: [u8; 4] = [0x00, 0x00, 0x00, 0x04];
    pub const SUPPLY: [u8; 4] = [0x00, 0x00, 0x00, 0x05];
    pub const DECIMALS: [u8; 4] = [0x00, 0x00, 0x00, 0x06];

    /// Type selector this contract registers under in the
    /// `ContractManager`'s constructor registry (distinct namespace from
    /// the method selectors above).
    pub const CONSTRUCT: [u8; 4] = [0x00, 0x00, 0x00, 0x00];
}

/// Constructor function registered under [`selector::CONSTRUCT`]: decodes
/// `decimals` (1 byte) and `mint_authority` (20 bytes) and builds a fresh
/// `Bank` owned by `creator`.
pub fn construct(creator: Address, args: &[u8]) -> RuntimeResult<std::sync::Arc<dyn Contract>> {
    if args.len() != 21 {
        return Err(RuntimeError::ContractExecution(
            "expected 1-byte decimals followed by 20-byte mint authority".into(),
        ));
    }
    let decimals = args[0];
    let mint_authority = Bank::decode_address(&args[1..21])?;
    Ok(std::sync::Arc::new(Bank::new(creator, decimals, mint_authority)))
}

fn address_to_topic(address: &Address) -> Hash {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(address.as_bytes());
    Hash::from_bytes(bytes)
}

pub struct Bank {
    owner: Address,
    decimals: u8,
    mint_authority: Address,
    supply: Safe<u128>,
    balances: SafeMap<Address, u128>,
}

impl Bank {
    pub fn new(owner: Address, decimals: u8, mint_authority: Address) -> Self {
        Self {
            owner,
            decimals,
            mint_authority,
            supply: Safe::new(0),
            balances: SafeMap::new(std::collections::HashMap::new()),
        }
    }

    pub fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.get_key(holder).unwrap_or(0)
    }

    pub fn supply(&self) -> u128 {
        self.supply.get()
    }

    fn decode_address_amount(args: &[u8]) -> RuntimeResult<(Address, u128)> {
        if args.len() != 36 {
            return Err(RuntimeError::ContractExecution(
                "expected 20-byte address followed by 16-byte amount".into(),
            ));
        }
        let mut addr_bytes = [0u8; 20];
        addr_bytes.copy_from_slice(&args[0..20]);
        let mut amount_bytes = [0u8; 16];
        amount_bytes.copy_from_slice(&args[20..36]);
        Ok((Address::from_bytes(addr_bytes), u128::from_be_bytes(amount_bytes)))
    }

    fn decode_amount(args: &[u8]) -> RuntimeResult<u128> {
        if args.len() != 16 {
            return Err(RuntimeError::ContractExecution("expected 16-byte amount".into()));
        }
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(args);
        Ok(u128::from_be_bytes(bytes))
    }

    fn decode_address(args: &[u8]) -> RuntimeResult<Address> {
        if args.len() != 20 {
            return Err(RuntimeError::ContractExecution("expected 20-byte address".into()));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(args);
        Ok(Address::from_bytes(bytes))
    }

    fn credit(&self, holder: Address, amount: u128, logger: &mut CallLogger) -> RuntimeResult<()> {
        let current = self.balance_of(&holder);
        let next = current
            .checked_add(amount)
            .ok_or_else(|| RuntimeError::ContractExecution(BankError::Overflow.to_string()))?;
        self.balances.insert(holder, next, logger)
    }

    fn debit(&self, holder: Address, amount: u128, logger: &mut CallLogger) -> RuntimeResult<()> {
        let current = self.balance_of(&holder);
        let next = current
            .checked_sub(amount)
            .ok_or_else(|| RuntimeError::ContractExecution(BankError::InsufficientFunds.to_string()))?;
        if next == 0 {
            self.balances.erase(&holder, logger)
        } else {
            self.balances.insert(holder, next, logger)
        }
    }
}

impl Contract for Bank {
    fn owner(&self) -> Address {
        self.owner
    }

    fn method_kind(&self, selector: [u8; 4]) -> Option<MethodKind> {
        match selector {
            selector::MINT_TO => Some(MethodKind::NonPayable),
            selector::TRANSFER => Some(MethodKind::NonPayable),
            selector::BURN => Some(MethodKind::NonPayable),
            selector::BALANCE_OF => Some(MethodKind::View),
            selector::SUPPLY => Some(MethodKind::View),
            selector::DECIMALS => Some(MethodKind::View),
            _ => None,
        }
    }

    fn dispatch(
        &self,
        selector: [u8; 4],
        args: &[u8],
        ctx: &CallContext,
        logger: &mut CallLogger,
        _manager: &ContractManager,
    ) -> RuntimeResult<Vec<u8>> {
        match selector {
            selector::MINT_TO => {
                if ctx.caller != self.mint_authority {
                    return Err(RuntimeError::OnlyOwner);
                }
                let (to, amount) = Self::decode_address_amount(args)?;
                let new_supply = self
                    .supply
                    .get()
                    .checked_add(amount)
                    .ok_or_else(|| RuntimeError::ContractExecution(BankError::Overflow.to_string()))?;
                self.supply.set(new_supply, logger)?;
                self.credit(to, amount, logger)?;
                logger.emit(runtime::Event::new(
                    "Mint",
                    ctx.address,
                    vec![address_to_topic(&to)],
                    amount.to_be_bytes().to_vec(),
                    Hash::zero(),
                    0,
                    ctx.block_height,
                    0,
                ));
                Ok(vec![])
            }
            selector::TRANSFER => {
                let (to, amount) = Self::decode_address_amount(args)?;
                self.debit(ctx.caller, amount, logger)?;
                self.credit(to, amount, logger)?;
                logger.emit(runtime::Event::new(
                    "Transfer",
                    ctx.address,
                    vec![address_to_topic(&ctx.caller), address_to_topic(&to)],
                    amount.to_be_bytes().to_vec(),
                    Hash::zero(),
                    0,
                    ctx.block_height,
                    0,
                ));
                Ok(vec![])
            }
            selector::BURN => {
                let amount = Self::decode_amount(args)?;
                self.debit(ctx.caller, amount, logger)?;
                let new_supply = self
                    .supply
                    .get()
                    .checked_sub(amount)
                    .ok_or_else(|| RuntimeError::ContractExecution(BankError::Overflow.to_string()))?;
                self.supply.set(new_supply, logger)?;
                logger.emit(runtime::Event::new(
                    "Burn",
                    ctx.address,
                    vec![address_to_topic(&ctx.caller)],
                    amount.to_be_bytes().to_vec(),
                    Hash::zero(),
                    0,
                    ctx.block_height,
                    0,
                ));
                Ok(vec![])
            }
            selector::BALANCE_OF => {
                let holder = Self::decode_address(args)?;
                Ok(self.balance_of(&holder).to_be_bytes().to_vec())
            }
            selector::SUPPLY => Ok(self.supply.get().to_be_bytes().to_vec()),
            selector::DECIMALS => Ok(vec![self.decimals]),
            _ => Err(RuntimeError::NoMethod(selector)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn args_addr_amount(to: Address, amount: u128) -> Vec<u8> {
        let mut v = to.as_bytes().to_vec();
        v.extend_from_slice(&amount.to_be_bytes());
        v
    }

    #[test]
    fn mint_then_balance_of_reflects_minted_amount() {
        let owner = addr(1);
        let manager = ContractManager::new();
        let bank_addr = manager.deploy(owner, Arc::new(Bank::new(owner, 6, owner)));
        manager
            .execute_transaction(owner, bank_addr, selector::MINT_TO, &args_addr_amount(addr(2), 100), 0, 1, 1)
            .unwrap();
        let data = manager
            .execute_view(owner, bank_addr, selector::BALANCE_OF, addr(2).as_bytes(), 1, 1)
            .unwrap();
        assert_eq!(u128::from_be_bytes(data.try_into().unwrap()), 100);
    }

    #[test]
    fn mint_from_non_authority_is_rejected() {
        let owner = addr(1);
        let manager = ContractManager::new();
        let bank_addr = manager.deploy(owner, Arc::new(Bank::new(owner, 6, owner)));
        let result = manager.execute_transaction(
            addr(9),
            bank_addr,
            selector::MINT_TO,
            &args_addr_amount(addr(2), 1),
            0,
            1,
            1,
        );
        assert_eq!(result.err(), Some(RuntimeError::OnlyOwner));
    }

    #[test]
    fn transfer_moves_balance_between_holders() {
        let owner = addr(1);
        let manager = ContractManager::new();
        let bank_addr = manager.deploy(owner, Arc::new(Bank::new(owner, 6, owner)));
        manager
            .execute_transaction(owner, bank_addr, selector::MINT_TO, &args_addr_amount(addr(2), 100), 0, 1, 1)
            .unwrap();
        manager
            .execute_transaction(addr(2), bank_addr, selector::TRANSFER, &args_addr_amount(addr(3), 40), 0, 2, 2)
            .unwrap();
        let from = manager
            .execute_view(owner, bank_addr, selector::BALANCE_OF, addr(2).as_bytes(), 2, 2)
            .unwrap();
        let to = manager
            .execute_view(owner, bank_addr, selector::BALANCE_OF, addr(3).as_bytes(), 2, 2)
            .unwrap();
        assert_eq!(u128::from_be_bytes(from.try_into().unwrap()), 60);
        assert_eq!(u128::from_be_bytes(to.try_into().unwrap()), 40);
    }

    #[test]
    fn transfer_more_than_balance_is_reverted_entirely() {
        let owner = addr(1);
        let manager = ContractManager::new();
        let bank_addr = manager.deploy(owner, Arc::new(Bank::new(owner, 6, owner)));
        manager
            .execute_transaction(owner, bank_addr, selector::MINT_TO, &args_addr_amount(addr(2), 10), 0, 1, 1)
            .unwrap();
        let result = manager.execute_transaction(
            addr(2),
            bank_addr,
            selector::TRANSFER,
            &args_addr_amount(addr(3), 50),
            0,
            2,
            2,
        );
        assert!(result.is_err());
        let balance = manager
            .execute_view(owner, bank_addr, selector::BALANCE_OF, addr(2).as_bytes(), 2, 2)
            .unwrap();
        assert_eq!(u128::from_be_bytes(balance.try_into().unwrap()), 10);
    }

    #[test]
    fn burn_reduces_balance_and_supply() {
        let owner = addr(1);
        let manager = ContractManager::new();
        let bank_addr = manager.deploy(owner, Arc::new(Bank::new(owner, 6, owner)));
        manager
            .execute_transaction(owner, bank_addr, selector::MINT_TO, &args_addr_amount(addr(2), 100), 0, 1, 1)
            .unwrap();
        manager
            .execute_transaction(addr(2), bank_addr, selector::BURN, &30u128.to_be_bytes(), 0, 2, 2)
            .unwrap();
        let supply = manager.execute_view(owner, bank_addr, selector::SUPPLY, &[], 2, 2).unwrap();
        assert_eq!(u128::from_be_bytes(supply.try_into().unwrap()), 70);
    }

    #[test]
    fn payable_value_sent_to_nonpayable_method_is_rejected() {
        let owner = addr(1);
        let manager = ContractManager::new();
        let bank_addr = manager.deploy(owner, Arc::new(Bank::new(owner, 6, owner)));
        let result = manager.execute_transaction(
            owner,
            bank_addr,
            selector::MINT_TO,
            &args_addr_amount(addr(2), 1),
            7,
            1,
            1,
        );
        assert_eq!(result.err(), Some(RuntimeError::NotPayable));
    }
}
