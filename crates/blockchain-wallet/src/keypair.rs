//! A validator/account keypair, wrapping the same secp256k1 primitives
//! `blockchain-core` signs transactions and blocks with (§3/§6). Holding
//! the `Secp256k1<All>` context once per keypair avoids re-initializing it
//! on every signature.

use crate::error::{Result, WalletError};
use blockchain_crypto::Address;
use secp256k1::{PublicKey, Secp256k1, SecretKey};

pub struct Keypair {
    secp: Secp256k1<secp256k1::All>,
    secret: SecretKey,
    public: PublicKey,
}

impl Keypair {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let secret = SecretKey::new(&mut secp256k1::rand::thread_rng());
        let public = PublicKey::from_secret_key(&secp, &secret);
        Self { secp, secret, public }
    }

    /// Import from a 32-byte big-endian secret scalar.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(bytes).map_err(|err| WalletError::InvalidKey(err.to_string()))?;
        let public = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self { secp, secret, public })
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn secp(&self) -> &Secp256k1<secp256k1::All> {
        &self.secp
    }

    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public)
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret.secret_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypair_recovers_its_own_address() {
        let kp = Keypair::generate();
        let recovered = Keypair::from_secret_bytes(&kp.secret.secret_bytes()).unwrap();
        assert_eq!(kp.address(), recovered.address());
    }

    #[test]
    fn secret_hex_round_trips_through_from_secret_bytes() {
        let kp = Keypair::generate();
        let bytes = hex::decode(kp.secret_hex()).unwrap();
        let restored = Keypair::from_secret_bytes(&bytes).unwrap();
        assert_eq!(kp.address(), restored.address());
    }

    #[test]
    fn zero_secret_is_rejected() {
        assert!(Keypair::from_secret_bytes(&[0u8; 32]).is_err());
    }
}
