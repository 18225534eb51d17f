//! 20-byte addresses derived from public keys or from `(creator, nonce)`
//! pairs for newly deployed contracts.

use crate::hash::keccak256;
use crate::{CryptoError, Result};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn zero() -> Self {
        Self([0u8; 20])
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Derive the address from an uncompressed secp256k1 public key: the low
    /// 20 bytes of keccak-256 of the 64-byte (x, y) encoding (no 0x04 prefix).
    pub fn from_public_key(pubkey: &PublicKey) -> Self {
        let uncompressed = pubkey.serialize_uncompressed();
        let without_prefix = &uncompressed[1..]; // drop the leading 0x04
        let digest = keccak256(without_prefix);
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest.as_bytes()[12..]);
        Self(out)
    }

    /// Derive a contract address from its creator and the creator's nonce at
    /// the time the deploying transaction was sent.
    pub fn from_creator(creator: &Address, creator_nonce: u64) -> Self {
        let mut buf = Vec::with_capacity(20 + 8);
        buf.extend_from_slice(&creator.0);
        buf.extend_from_slice(&creator_nonce.to_be_bytes());
        let digest = keccak256(&buf);
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest.as_bytes()[12..]);
        Self(out)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| CryptoError::AddressError(e.to_string()))?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| CryptoError::AddressError("expected 20 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::{rand, Secp256k1, SecretKey};

    #[test]
    fn pubkey_derivation_is_stable() {
        let secp = Secp256k1::new();
        let sk = SecretKey::new(&mut rand::thread_rng());
        let pk = PublicKey::from_secret_key(&secp, &sk);
        let a1 = Address::from_public_key(&pk);
        let a2 = Address::from_public_key(&pk);
        assert_eq!(a1, a2);
    }

    #[test]
    fn contract_address_depends_on_nonce() {
        let creator = Address::from_bytes([1u8; 20]);
        let a0 = Address::from_creator(&creator, 0);
        let a1 = Address::from_creator(&creator, 1);
        assert_ne!(a0, a1);
    }

    #[test]
    fn hex_round_trip() {
        let a = Address::from_bytes([9u8; 20]);
        assert_eq!(Address::from_hex(&a.to_hex()).unwrap(), a);
    }
}
