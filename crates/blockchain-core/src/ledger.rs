//! Address-keyed account table holding native balance and nonce (§4.1).

use crate::error::ChainError;
use blockchain_crypto::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: u128,
    pub nonce: u64,
}

/// In-memory account table. Persistence through `blockchain-storage` is the
/// caller's responsibility (the state machine flushes it on block commit);
/// the ledger itself only enforces the balance/nonce invariants.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    accounts: HashMap<Address, Account>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_balance(&self, addr: &Address) -> u128 {
        self.accounts.get(addr).map(|a| a.balance).unwrap_or(0)
    }

    pub fn get_nonce(&self, addr: &Address) -> u64 {
        self.accounts.get(addr).map(|a| a.nonce).unwrap_or(0)
    }

    pub fn get_account(&self, addr: &Address) -> Account {
        self.accounts.get(addr).copied().unwrap_or_default()
    }

    /// Credits an address, lazily creating the account with zero nonce.
    pub fn credit(&mut self, addr: Address, amount: u128) {
        let account = self.accounts.entry(addr).or_default();
        account.balance = account.balance.saturating_add(amount);
    }

    /// Debits an address. Fails without side effects if the balance would
    /// underflow.
    pub fn debit(&mut self, addr: Address, amount: u128) -> Result<(), ChainError> {
        let available = self.get_balance(&addr);
        if available < amount {
            return Err(ChainError::InsufficientBalance {
                available,
                required: amount,
            });
        }
        let account = self.accounts.entry(addr).or_default();
        account.balance -= amount;
        Ok(())
    }

    pub fn increment_nonce(&mut self, addr: Address) {
        let account = self.accounts.entry(addr).or_default();
        account.nonce += 1;
    }

    /// Iterate over every known account, for serialization / determinism
    /// checks (§8 "deterministic state").
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    /// Byte-deterministic serialization of the whole ledger, used to compare
    /// state across nodes (§8).
    pub fn deterministic_digest(&self) -> Vec<u8> {
        let mut entries: Vec<(&Address, &Account)> = self.accounts.iter().collect();
        entries.sort_by_key(|(addr, _)| addr.0);
        let mut buf = Vec::new();
        for (addr, account) in entries {
            buf.extend_from_slice(addr.as_bytes());
            buf.extend_from_slice(&account.balance.to_be_bytes());
            buf.extend_from_slice(&account.nonce.to_be_bytes());
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn credit_creates_account_lazily() {
        let mut ledger = Ledger::new();
        ledger.credit(addr(1), 100);
        assert_eq!(ledger.get_balance(&addr(1)), 100);
        assert_eq!(ledger.get_nonce(&addr(1)), 0);
    }

    #[test]
    fn debit_underflow_fails_without_mutation() {
        let mut ledger = Ledger::new();
        ledger.credit(addr(1), 10);
        assert!(ledger.debit(addr(1), 20).is_err());
        assert_eq!(ledger.get_balance(&addr(1)), 10);
    }

    #[test]
    fn nonce_increments_monotonically() {
        let mut ledger = Ledger::new();
        ledger.increment_nonce(addr(1));
        ledger.increment_nonce(addr(1));
        assert_eq!(ledger.get_nonce(&addr(1)), 2);
    }

    #[test]
    fn deterministic_digest_is_order_independent() {
        let mut a = Ledger::new();
        a.credit(addr(1), 5);
        a.credit(addr(2), 7);
        let mut b = Ledger::new();
        b.credit(addr(2), 7);
        b.credit(addr(1), 5);
        assert_eq!(a.deterministic_digest(), b.deterministic_digest());
    }
}
