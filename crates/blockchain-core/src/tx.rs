//! The two wire-signed transaction forms (§4.2): user-facing `BlockTx` and
//! consensus-facing `ValidatorTx`.

use crate::error::ChainError;
use crate::rlp;
use blockchain_crypto::hash::keccak256;
use blockchain_crypto::signature::{recover_signer, sign_message, Signature};
use blockchain_crypto::{Address, Hash};
use secp256k1::{Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};

pub const RANDOM_HASH_SELECTOR: [u8; 4] = [0xcf, 0xff, 0xe7, 0x46];
pub const RANDOM_SEED_SELECTOR: [u8; 4] = [0x6f, 0xc5, 0xa2, 0xd6];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorSelector {
    RandomHash,
    RandomSeed,
}

impl ValidatorSelector {
    pub fn from_bytes(selector: [u8; 4]) -> Result<Self, ChainError> {
        match selector {
            RANDOM_HASH_SELECTOR => Ok(Self::RandomHash),
            RANDOM_SEED_SELECTOR => Ok(Self::RandomSeed),
            other => Err(ChainError::Malformed(format!(
                "unknown validator tx selector {:02x?}",
                other
            ))),
        }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        match self {
            Self::RandomHash => RANDOM_HASH_SELECTOR,
            Self::RandomSeed => RANDOM_SEED_SELECTOR,
        }
    }
}

/// A user-payload transaction: a plain transfer, or a contract call/deploy
/// when `to`/`data` target the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockTx {
    pub to: Address,
    pub from: Address,
    pub data: Vec<u8>,
    pub chain_id: u32,
    pub nonce: u64,
    pub value: u128,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub gas_limit: u64,
    pub signature: Signature,
}

impl BlockTx {
    /// Fields that participate in the signed payload, in canonical order,
    /// excluding the signature itself.
    fn signing_fields(
        to: &Address,
        data: &[u8],
        chain_id: u32,
        nonce: u64,
        value: u128,
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
        gas_limit: u64,
    ) -> Vec<u8> {
        rlp::encode_list(&[
            to.as_bytes(),
            data,
            &chain_id.to_be_bytes(),
            &nonce.to_be_bytes(),
            &value.to_be_bytes(),
            &max_fee_per_gas.to_be_bytes(),
            &max_priority_fee_per_gas.to_be_bytes(),
            &gas_limit.to_be_bytes(),
        ])
    }

    fn signing_digest(
        to: &Address,
        data: &[u8],
        chain_id: u32,
        nonce: u64,
        value: u128,
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
        gas_limit: u64,
    ) -> Hash {
        keccak256(&Self::signing_fields(
            to,
            data,
            chain_id,
            nonce,
            value,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            gas_limit,
        ))
    }

    /// Build and sign a new transaction.
    #[allow(clippy::too_many_arguments)]
    pub fn sign(
        secp: &Secp256k1<secp256k1::All>,
        sk: &SecretKey,
        to: Address,
        data: Vec<u8>,
        chain_id: u32,
        nonce: u64,
        value: u128,
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
        gas_limit: u64,
    ) -> Self {
        let digest = Self::signing_digest(
            &to,
            &data,
            chain_id,
            nonce,
            value,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            gas_limit,
        );
        let signature = sign_message(secp, &digest, sk);
        let pk = secp256k1::PublicKey::from_secret_key(secp, sk);
        Self {
            to,
            from: Address::from_public_key(&pk),
            data,
            chain_id,
            nonce,
            value,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            gas_limit,
            signature,
        }
    }

    /// Verifies `chain_id`, recovers `from` from the signature, and checks
    /// signature canonicality. Does not touch the ledger.
    pub fn verify(
        secp: &Secp256k1<secp256k1::All>,
        expected_chain_id: u32,
        to: Address,
        data: Vec<u8>,
        chain_id: u32,
        nonce: u64,
        value: u128,
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
        gas_limit: u64,
        signature: Signature,
    ) -> Result<Self, ChainError> {
        if chain_id != expected_chain_id {
            return Err(ChainError::WrongChainId {
                expected: expected_chain_id,
                got: chain_id,
            });
        }
        let digest = Self::signing_digest(
            &to,
            &data,
            chain_id,
            nonce,
            value,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            gas_limit,
        );
        let (from, _pk) = recover_signer(secp, &digest, &signature)?;
        Ok(Self {
            to,
            from,
            data,
            chain_id,
            nonce,
            value,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            gas_limit,
            signature,
        })
    }

    /// keccak-256 of the canonical RLP encoding, including the signature.
    pub fn hash(&self) -> Hash {
        let bytes = rlp::encode_list(&[
            self.to.as_bytes(),
            &self.data,
            &self.chain_id.to_be_bytes(),
            &self.nonce.to_be_bytes(),
            &self.value.to_be_bytes(),
            &self.max_fee_per_gas.to_be_bytes(),
            &self.max_priority_fee_per_gas.to_be_bytes(),
            &self.gas_limit.to_be_bytes(),
            &self.signature.to_bytes(),
        ]);
        keccak256(&bytes)
    }

    /// Canonical wire encoding used inside a serialized block (§4.3).
    pub fn to_bytes(&self) -> Vec<u8> {
        rlp::encode_list(&[
            self.to.as_bytes(),
            &self.data,
            &self.chain_id.to_be_bytes(),
            &self.nonce.to_be_bytes(),
            &self.value.to_be_bytes(),
            &self.max_fee_per_gas.to_be_bytes(),
            &self.max_priority_fee_per_gas.to_be_bytes(),
            &self.gas_limit.to_be_bytes(),
            &self.signature.to_bytes(),
        ])
    }

    /// Inverse of [`Self::to_bytes`]; re-verifies the chain id and recovers
    /// `from` from the signature.
    pub fn from_bytes(
        secp: &Secp256k1<secp256k1::All>,
        expected_chain_id: u32,
        bytes: &[u8],
    ) -> Result<Self, ChainError> {
        let fields = rlp::decode_list(bytes)?;
        if fields.len() != 9 {
            return Err(ChainError::Malformed("block tx: wrong field count".into()));
        }
        let to = field_to_address(&fields[0])?;
        let data = fields[1].clone();
        let chain_id = field_to_u32(&fields[2])?;
        let nonce = field_to_u64(&fields[3])?;
        let value = field_to_u128(&fields[4])?;
        let max_fee_per_gas = field_to_u128(&fields[5])?;
        let max_priority_fee_per_gas = field_to_u128(&fields[6])?;
        let gas_limit = field_to_u64(&fields[7])?;
        let signature = Signature::from_bytes(&fields[8])?;
        Self::verify(
            secp,
            expected_chain_id,
            to,
            data,
            chain_id,
            nonce,
            value,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            gas_limit,
            signature,
        )
    }

    /// Total native units this tx can debit from `from` if fully executed:
    /// `gasLimit * maxFeePerGas + value`.
    pub fn max_cost(&self) -> u128 {
        (self.gas_limit as u128)
            .saturating_mul(self.max_fee_per_gas)
            .saturating_add(self.value)
    }

    pub fn is_contract_call(&self) -> bool {
        !self.data.is_empty()
    }
}

/// A consensus-payload transaction carrying a randomness commit or reveal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorTx {
    pub from: Address,
    pub selector: ValidatorSelector,
    pub payload: [u8; 32],
    pub chain_id: u32,
    pub height: u64,
    pub signature: Signature,
}

impl ValidatorTx {
    fn signing_digest(selector: ValidatorSelector, payload: &[u8; 32], chain_id: u32, height: u64) -> Hash {
        let data = rlp::encode_list(&[
            &selector.to_bytes(),
            payload,
            &chain_id.to_be_bytes(),
            &height.to_be_bytes(),
        ]);
        keccak256(&data)
    }

    pub fn sign(
        secp: &Secp256k1<secp256k1::All>,
        sk: &SecretKey,
        selector: ValidatorSelector,
        payload: [u8; 32],
        chain_id: u32,
        height: u64,
    ) -> Self {
        let digest = Self::signing_digest(selector, &payload, chain_id, height);
        let signature = sign_message(secp, &digest, sk);
        let pk = secp256k1::PublicKey::from_secret_key(secp, sk);
        Self {
            from: Address::from_public_key(&pk),
            selector,
            payload,
            chain_id,
            height,
            signature,
        }
    }

    pub fn verify(
        secp: &Secp256k1<secp256k1::All>,
        expected_chain_id: u32,
        selector: ValidatorSelector,
        payload: [u8; 32],
        chain_id: u32,
        height: u64,
        signature: Signature,
    ) -> Result<Self, ChainError> {
        if chain_id != expected_chain_id {
            return Err(ChainError::WrongChainId {
                expected: expected_chain_id,
                got: chain_id,
            });
        }
        let digest = Self::signing_digest(selector, &payload, chain_id, height);
        let (from, _pk) = recover_signer(secp, &digest, &signature)?;
        Ok(Self {
            from,
            selector,
            payload,
            chain_id,
            height,
            signature,
        })
    }

    pub fn hash(&self) -> Hash {
        let bytes = rlp::encode_list(&[
            self.from.as_bytes(),
            &self.selector.to_bytes(),
            &self.payload,
            &self.chain_id.to_be_bytes(),
            &self.height.to_be_bytes(),
            &self.signature.to_bytes(),
        ]);
        keccak256(&bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        rlp::encode_list(&[
            self.from.as_bytes(),
            &self.selector.to_bytes(),
            &self.payload,
            &self.chain_id.to_be_bytes(),
            &self.height.to_be_bytes(),
            &self.signature.to_bytes(),
        ])
    }

    pub fn from_bytes(
        secp: &Secp256k1<secp256k1::All>,
        expected_chain_id: u32,
        bytes: &[u8],
    ) -> Result<Self, ChainError> {
        let fields = rlp::decode_list(bytes)?;
        if fields.len() != 6 {
            return Err(ChainError::Malformed("validator tx: wrong field count".into()));
        }
        let selector_bytes: [u8; 4] = fields[1]
            .clone()
            .try_into()
            .map_err(|_| ChainError::Malformed("validator tx: bad selector length".into()))?;
        let selector = ValidatorSelector::from_bytes(selector_bytes)?;
        let payload: [u8; 32] = fields[2]
            .clone()
            .try_into()
            .map_err(|_| ChainError::Malformed("validator tx: payload must be 32 bytes".into()))?;
        let chain_id = field_to_u32(&fields[3])?;
        let height = field_to_u64(&fields[4])?;
        let signature = Signature::from_bytes(&fields[5])?;
        Self::verify(secp, expected_chain_id, selector, payload, chain_id, height, signature)
    }
}

fn field_to_address(bytes: &[u8]) -> Result<Address, ChainError> {
    let arr: [u8; 20] = bytes
        .try_into()
        .map_err(|_| ChainError::Malformed("expected a 20-byte address field".into()))?;
    Ok(Address::from_bytes(arr))
}

fn field_to_u32(bytes: &[u8]) -> Result<u32, ChainError> {
    field_to_uint(bytes).map(|v| v as u32)
}

fn field_to_u64(bytes: &[u8]) -> Result<u64, ChainError> {
    field_to_uint(bytes).map(|v| v as u64)
}

fn field_to_u128(bytes: &[u8]) -> Result<u128, ChainError> {
    field_to_uint(bytes)
}

/// Decode an RLP byte string as a big-endian unsigned integer. RLP strips
/// leading zero bytes, so the field may be shorter than the full width.
fn field_to_uint(bytes: &[u8]) -> Result<u128, ChainError> {
    if bytes.len() > 16 {
        return Err(ChainError::Malformed("integer field too wide".into()));
    }
    let mut out = 0u128;
    for b in bytes {
        out = (out << 8) | (*b as u128);
    }
    Ok(out)
}
