//! Blocks: 144-byte header plus user/validator transaction lists, signed by
//! the elected producer (§4.3). A block is either [`MutableBlock`] (under
//! construction) or [`Block`] (finalized, immutable, hashable).

use crate::error::ChainError;
use crate::tx::{BlockTx, ValidatorTx};
use blockchain_crypto::hash::{keccak256, merkle_root};
use blockchain_crypto::signature::{recover_signer, sign_message, Signature};
use blockchain_crypto::{Address, Hash};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};

pub const HEADER_LEN: usize = 144;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub prev_hash: Hash,
    pub block_randomness: Hash,
    pub validator_merkle_root: Hash,
    pub tx_merkle_root: Hash,
    /// Microseconds since epoch.
    pub timestamp: u64,
    pub height: u64,
}

impl BlockHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..32].copy_from_slice(self.prev_hash.as_bytes());
        out[32..64].copy_from_slice(self.block_randomness.as_bytes());
        out[64..96].copy_from_slice(self.validator_merkle_root.as_bytes());
        out[96..128].copy_from_slice(self.tx_merkle_root.as_bytes());
        out[128..136].copy_from_slice(&self.timestamp.to_le_bytes());
        out[136..144].copy_from_slice(&self.height.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        if bytes.len() != HEADER_LEN {
            return Err(ChainError::Malformed(format!(
                "block header must be {HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let field = |range: std::ops::Range<usize>| -> [u8; 32] {
            let mut out = [0u8; 32];
            out.copy_from_slice(&bytes[range]);
            out
        };
        Ok(Self {
            prev_hash: Hash::from_bytes(field(0..32)),
            block_randomness: Hash::from_bytes(field(32..64)),
            validator_merkle_root: Hash::from_bytes(field(64..96)),
            tx_merkle_root: Hash::from_bytes(field(96..128)),
            timestamp: u64::from_le_bytes(bytes[128..136].try_into().unwrap()),
            height: u64::from_le_bytes(bytes[136..144].try_into().unwrap()),
        })
    }

    pub fn hash(&self) -> Hash {
        keccak256(&self.to_bytes())
    }
}

/// Derive `blockRandomness = keccak256(concat(revealed seeds in tx order))`.
pub fn compute_block_randomness(validator_txs: &[ValidatorTx]) -> Hash {
    let mut buf = Vec::new();
    for tx in validator_txs {
        if tx.selector == crate::tx::ValidatorSelector::RandomSeed {
            buf.extend_from_slice(&tx.payload);
        }
    }
    keccak256(&buf)
}

/// A block under construction: not yet signed, not yet hashable.
#[derive(Debug, Clone)]
pub struct MutableBlock {
    pub prev_hash: Hash,
    pub height: u64,
    pub timestamp: u64,
    pub user_txs: Vec<BlockTx>,
    pub validator_txs: Vec<ValidatorTx>,
}

impl MutableBlock {
    pub fn new(prev_hash: Hash, height: u64, timestamp: u64) -> Self {
        Self {
            prev_hash,
            height,
            timestamp,
            user_txs: Vec::new(),
            validator_txs: Vec::new(),
        }
    }

    /// Sign and seal the block. Fails if `timestamp` does not strictly
    /// advance past `prev_timestamp`.
    pub fn finalize(
        self,
        secp: &Secp256k1<secp256k1::All>,
        producer_sk: &SecretKey,
        prev_timestamp: u64,
    ) -> Result<Block, ChainError> {
        if self.timestamp <= prev_timestamp {
            return Err(ChainError::InvalidBlock(
                "timestamp must strictly advance past the previous block".into(),
            ));
        }
        let tx_merkle_root = merkle_root(&self.user_txs.iter().map(|t| t.hash()).collect::<Vec<_>>());
        let validator_merkle_root =
            merkle_root(&self.validator_txs.iter().map(|t| t.hash()).collect::<Vec<_>>());
        let block_randomness = compute_block_randomness(&self.validator_txs);
        let header = BlockHeader {
            prev_hash: self.prev_hash,
            block_randomness,
            validator_merkle_root,
            tx_merkle_root,
            timestamp: self.timestamp,
            height: self.height,
        };
        let header_hash = header.hash();
        let signature = sign_message(secp, &header_hash, producer_sk);
        Ok(Block {
            header,
            user_txs: self.user_txs,
            validator_txs: self.validator_txs,
            signature,
        })
    }
}

/// A finalized, immutable, hashable block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub user_txs: Vec<BlockTx>,
    pub validator_txs: Vec<ValidatorTx>,
    pub signature: Signature,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Recovers the signer's address from the block signature.
    pub fn recover_producer(&self, secp: &Secp256k1<secp256k1::All>) -> Result<(Address, PublicKey), ChainError> {
        let (addr, pk) = recover_signer(secp, &self.header.hash(), &self.signature)?;
        Ok((addr, pk))
    }

    /// Recomputes both merkle roots and the randomness seed and checks them
    /// byte-for-byte against the header (§4.3's "deserialization recomputes
    /// ... and requires byte-for-byte agreement").
    pub fn check_integrity(&self) -> Result<(), ChainError> {
        let tx_root = merkle_root(&self.user_txs.iter().map(|t| t.hash()).collect::<Vec<_>>());
        if tx_root != self.header.tx_merkle_root {
            return Err(ChainError::InvalidBlock("tx merkle root mismatch".into()));
        }
        let validator_root =
            merkle_root(&self.validator_txs.iter().map(|t| t.hash()).collect::<Vec<_>>());
        if validator_root != self.header.validator_merkle_root {
            return Err(ChainError::InvalidBlock("validator merkle root mismatch".into()));
        }
        let randomness = compute_block_randomness(&self.validator_txs);
        if randomness != self.header.block_randomness {
            return Err(ChainError::InvalidBlock("block randomness mismatch".into()));
        }
        Ok(())
    }

    /// `signature(65) || header(144) || validatorTxStartOffset(8 LE) ||
    /// [user-tx: len(4 LE) || bytes]* || [validator-tx: len(4 LE) || bytes]*`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut user_tx_bytes = Vec::new();
        for tx in &self.user_txs {
            let bytes = tx.to_bytes();
            user_tx_bytes.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            user_tx_bytes.extend_from_slice(&bytes);
        }
        let validator_tx_start_offset = (65 + HEADER_LEN + 8 + user_tx_bytes.len()) as u64;

        let mut out = Vec::with_capacity(validator_tx_start_offset as usize);
        out.extend_from_slice(&self.signature.to_bytes());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&validator_tx_start_offset.to_le_bytes());
        out.extend_from_slice(&user_tx_bytes);
        for tx in &self.validator_txs {
            let bytes = tx.to_bytes();
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(&bytes);
        }
        out
    }

    /// Parallel-eligible deserialization: user txs above `threshold` may be
    /// decoded on worker threads, but output order always matches serial
    /// decoding (§4.3). The sequential path below is the reference;
    /// `from_bytes_parallel` is the optimized variant with identical output.
    pub fn from_bytes(
        secp: &Secp256k1<secp256k1::All>,
        chain_id: u32,
        bytes: &[u8],
    ) -> Result<Self, ChainError> {
        Self::from_bytes_impl(secp, chain_id, bytes, false)
    }

    /// Same contract as [`Self::from_bytes`], decoding user txs in parallel
    /// above an implementation-chosen size threshold (§4.3, optional).
    pub fn from_bytes_parallel(
        secp: &Secp256k1<secp256k1::All>,
        chain_id: u32,
        bytes: &[u8],
    ) -> Result<Self, ChainError> {
        Self::from_bytes_impl(secp, chain_id, bytes, true)
    }

    fn from_bytes_impl(
        secp: &Secp256k1<secp256k1::All>,
        chain_id: u32,
        bytes: &[u8],
        parallel: bool,
    ) -> Result<Self, ChainError> {
        const PARALLEL_THRESHOLD: usize = 256;
        if bytes.len() < 65 + HEADER_LEN + 8 {
            return Err(ChainError::Malformed("block too short".into()));
        }
        let signature = Signature::from_bytes(&bytes[0..65])?;
        let header = BlockHeader::from_bytes(&bytes[65..65 + HEADER_LEN])?;
        let offset_field = 65 + HEADER_LEN;
        let validator_tx_start_offset =
            u64::from_le_bytes(bytes[offset_field..offset_field + 8].try_into().unwrap()) as usize;
        if validator_tx_start_offset > bytes.len() {
            return Err(ChainError::Malformed("validator tx offset out of range".into()));
        }

        let user_tx_region = &bytes[offset_field + 8..validator_tx_start_offset];
        let user_tx_frames = split_length_prefixed(user_tx_region)?;
        let user_txs = if parallel && user_tx_frames.len() > PARALLEL_THRESHOLD {
            decode_txs_parallel(secp, chain_id, &user_tx_frames)?
        } else {
            user_tx_frames
                .iter()
                .map(|frame| BlockTx::from_bytes(secp, chain_id, frame))
                .collect::<Result<Vec<_>, _>>()?
        };

        let validator_tx_region = &bytes[validator_tx_start_offset..];
        let validator_tx_frames = split_length_prefixed(validator_tx_region)?;
        let validator_txs = validator_tx_frames
            .iter()
            .map(|frame| ValidatorTx::from_bytes(secp, chain_id, frame))
            .collect::<Result<Vec<_>, _>>()?;

        let block = Block {
            header,
            user_txs,
            validator_txs,
            signature,
        };
        block.check_integrity()?;
        Ok(block)
    }
}

fn split_length_prefixed(mut region: &[u8]) -> Result<Vec<&[u8]>, ChainError> {
    let mut frames = Vec::new();
    while !region.is_empty() {
        if region.len() < 4 {
            return Err(ChainError::Malformed("truncated tx length prefix".into()));
        }
        let len = u32::from_le_bytes(region[0..4].try_into().unwrap()) as usize;
        if region.len() < 4 + len {
            return Err(ChainError::Malformed("truncated tx body".into()));
        }
        frames.push(&region[4..4 + len]);
        region = &region[4 + len..];
    }
    Ok(frames)
}

fn decode_txs_parallel(
    secp: &Secp256k1<secp256k1::All>,
    chain_id: u32,
    frames: &[&[u8]],
) -> Result<Vec<BlockTx>, ChainError> {
    use std::sync::Mutex;
    let results: Vec<Mutex<Option<Result<BlockTx, ChainError>>>> =
        frames.iter().map(|_| Mutex::new(None)).collect();
    std::thread::scope(|scope| {
        for (i, frame) in frames.iter().enumerate() {
            let slot = &results[i];
            scope.spawn(move || {
                *slot.lock().unwrap() = Some(BlockTx::from_bytes(secp, chain_id, frame));
            });
        }
    });
    results
        .into_iter()
        .map(|slot| slot.into_inner().unwrap().expect("every slot is filled"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::ValidatorSelector;
    use secp256k1::rand;

    fn key(secp: &Secp256k1<secp256k1::All>) -> SecretKey {
        SecretKey::new(&mut rand::thread_rng())
    }

    #[test]
    fn header_round_trips_exact_144_bytes() {
        let header = BlockHeader {
            prev_hash: Hash::from_bytes([1u8; 32]),
            block_randomness: Hash::from_bytes([2u8; 32]),
            validator_merkle_root: Hash::from_bytes([3u8; 32]),
            tx_merkle_root: Hash::from_bytes([4u8; 32]),
            timestamp: 123456789,
            height: 42,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(BlockHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn finalize_rejects_non_advancing_timestamp() {
        let secp = Secp256k1::new();
        let sk = key(&secp);
        let block = MutableBlock::new(Hash::zero(), 1, 100);
        assert!(block.finalize(&secp, &sk, 100).is_err());
        assert!(MutableBlock::new(Hash::zero(), 1, 101)
            .finalize(&secp, &sk, 100)
            .is_ok());
    }

    #[test]
    fn serialize_then_deserialize_round_trips_bitwise() {
        let secp = Secp256k1::new();
        let producer_sk = key(&secp);
        let user_sk = key(&secp);
        let to = Address::from_bytes([9u8; 20]);
        let user_tx = BlockTx::sign(&secp, &user_sk, to, vec![], 1, 0, 5, 1, 0, 21000);

        let validator_sk = key(&secp);
        let seed = [7u8; 32];
        let hash_tx = ValidatorTx::sign(
            &secp,
            &validator_sk,
            ValidatorSelector::RandomHash,
            *blockchain_crypto::hash::keccak256(&seed).as_bytes(),
            1,
            1,
        );
        let seed_tx = ValidatorTx::sign(&secp, &validator_sk, ValidatorSelector::RandomSeed, seed, 1, 1);

        let mut mutable = MutableBlock::new(Hash::zero(), 1, 500);
        mutable.user_txs.push(user_tx);
        mutable.validator_txs.push(hash_tx);
        mutable.validator_txs.push(seed_tx);
        let block = mutable.finalize(&secp, &producer_sk, 100).unwrap();

        let bytes = block.to_bytes();
        let decoded = Block::from_bytes(&secp, 1, &bytes).unwrap();
        assert_eq!(decoded.to_bytes(), bytes);
        assert_eq!(decoded.hash(), block.hash());
    }

    #[test]
    fn integrity_check_catches_tampered_randomness() {
        let secp = Secp256k1::new();
        let producer_sk = key(&secp);
        let mut mutable = MutableBlock::new(Hash::zero(), 1, 500);
        mutable.timestamp = 500;
        let mut block = mutable.finalize(&secp, &producer_sk, 100).unwrap();
        block.header.block_randomness = Hash::from_bytes([0xffu8; 32]);
        assert!(block.check_integrity().is_err());
    }
}
