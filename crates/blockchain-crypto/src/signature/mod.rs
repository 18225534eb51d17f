//! secp256k1 ECDSA signing and public-key recovery, EIP-1559-style: the
//! recovery id is folded into a `v` byte alongside the 32-byte `r` and `s`.

use crate::address::Address;
use crate::hash::Hash;
use crate::{CryptoError, Result};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};

/// The curve order's half, used to reject non-canonical (high-s) signatures.
/// n = 0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141
const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// A 65-byte recoverable ECDSA signature: `r(32) || s(32) || v(1)`.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 {
            return Err(CryptoError::InvalidSignature);
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v: bytes[64] })
    }

    /// Rejects the upper half of the curve order, per EIP-2 / this spec's
    /// "reject non-canonical s values (low-half only)" requirement.
    pub fn is_canonical(&self) -> bool {
        self.s.as_slice() <= SECP256K1_HALF_ORDER.as_slice()
    }
}

/// Sign a 32-byte message digest, producing a canonical (low-s) signature.
pub fn sign_message(secp: &Secp256k1<secp256k1::All>, digest: &Hash, sk: &SecretKey) -> Signature {
    let message = Message::from_digest(*digest.as_bytes());
    let recoverable = secp.sign_ecdsa_recoverable(&message, sk);
    let (recid, compact) = recoverable.serialize_compact();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&compact[..32]);
    s.copy_from_slice(&compact[32..]);
    Signature {
        r,
        s,
        v: recid.to_i32() as u8,
    }
}

/// Recover the signer's address and public key from a signature over a
/// 32-byte digest. Fails on recovery error or a non-canonical `s`.
pub fn recover_signer(
    secp: &Secp256k1<secp256k1::All>,
    digest: &Hash,
    sig: &Signature,
) -> Result<(Address, PublicKey)> {
    if !sig.is_canonical() {
        return Err(CryptoError::NonCanonicalSignature);
    }
    let recid = RecoveryId::from_i32(sig.v as i32).map_err(|_| CryptoError::InvalidSignature)?;
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&sig.r);
    compact[32..].copy_from_slice(&sig.s);
    let recoverable = RecoverableSignature::from_compact(&compact, recid)
        .map_err(|_| CryptoError::InvalidSignature)?;
    let message = Message::from_digest(*digest.as_bytes());
    let pubkey = secp
        .recover_ecdsa(&message, &recoverable)
        .map_err(|_| CryptoError::InvalidSignature)?;
    Ok((Address::from_public_key(&pubkey), pubkey))
}
