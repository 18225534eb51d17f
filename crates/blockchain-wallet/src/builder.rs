//! Convenience builders over `blockchain_core::tx`'s `sign` constructors, so
//! callers reach for a `Keypair` instead of threading around a raw
//! `SecretKey` and a `Secp256k1` context.

use crate::keypair::Keypair;
use blockchain_core::tx::{BlockTx, ValidatorSelector, ValidatorTx};
use blockchain_crypto::Address;

#[allow(clippy::too_many_arguments)]
pub fn sign_block_tx(
    keypair: &Keypair,
    to: Address,
    data: Vec<u8>,
    chain_id: u32,
    nonce: u64,
    value: u128,
    max_fee_per_gas: u128,
    max_priority_fee_per_gas: u128,
    gas_limit: u64,
) -> BlockTx {
    BlockTx::sign(
        keypair.secp(),
        keypair.secret_key(),
        to,
        data,
        chain_id,
        nonce,
        value,
        max_fee_per_gas,
        max_priority_fee_per_gas,
        gas_limit,
    )
}

pub fn sign_validator_tx(
    keypair: &Keypair,
    selector: ValidatorSelector,
    payload: [u8; 32],
    chain_id: u32,
    height: u64,
) -> ValidatorTx {
    ValidatorTx::sign(keypair.secp(), keypair.secret_key(), selector, payload, chain_id, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_block_tx_carries_the_keypairs_address() {
        let kp = Keypair::generate();
        let to = Address::zero();
        let tx = sign_block_tx(&kp, to, vec![], 1, 0, 0, 1, 0, 21000);
        assert_eq!(tx.from, kp.address());
    }

    #[test]
    fn signed_validator_tx_carries_the_keypairs_address() {
        let kp = Keypair::generate();
        let tx = sign_validator_tx(&kp, ValidatorSelector::RandomSeed, [3u8; 32], 1, 5);
        assert_eq!(tx.from, kp.address());
    }
}
