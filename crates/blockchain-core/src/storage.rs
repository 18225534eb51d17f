//! Append-only block log plus secondary indexes (§4.4), built on top of the
//! external key-value store contract (§6).

use crate::block::Block;
use crate::error::ChainError;
use blockchain_crypto::Hash;
use blockchain_storage::{KvStore, Prefix};
use secp256k1::Secp256k1;
use std::sync::Arc;

/// `Storage.mutex` from §5: guards the log and indexes, kept separate from
/// `State.stateMutex`. `parking_lot::Mutex` serializes the append path; reads
/// only need the underlying `KvStore`, which is already internally
/// synchronized, so they bypass this lock entirely.
pub struct BlockStore<S: KvStore> {
    db: Arc<S>,
    secp: Secp256k1<secp256k1::All>,
    chain_id: u32,
    append_lock: parking_lot::Mutex<()>,
}

impl<S: KvStore> BlockStore<S> {
    pub fn new(db: Arc<S>, chain_id: u32) -> Self {
        Self {
            db,
            secp: Secp256k1::new(),
            chain_id,
            append_lock: parking_lot::Mutex::new(()),
        }
    }

    fn height_key(height: u64) -> Vec<u8> {
        height.to_be_bytes().to_vec()
    }

    pub fn latest_height(&self) -> Result<u64, ChainError> {
        let keys = self.db.get_keys(Prefix::Blocks, None, None)?;
        keys.iter()
            .map(|k| {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(k);
                u64::from_be_bytes(arr)
            })
            .max()
            .ok_or(ChainError::NotFound)
    }

    pub fn latest(&self) -> Result<Block, ChainError> {
        let height = self.latest_height()?;
        self.get_by_height(height)
    }

    pub fn get_by_height(&self, height: u64) -> Result<Block, ChainError> {
        let bytes = self
            .db
            .get(Prefix::Blocks, &Self::height_key(height))?
            .ok_or(ChainError::NotFound)?;
        Block::from_bytes(&self.secp, self.chain_id, &bytes)
    }

    pub fn get_by_hash(&self, hash: &Hash) -> Result<Block, ChainError> {
        let height_bytes = self
            .db
            .get(Prefix::BlockHeightMaps, hash.as_bytes())?
            .ok_or(ChainError::NotFound)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&height_bytes);
        self.get_by_height(u64::from_be_bytes(arr))
    }

    pub fn get_tx(&self, tx_hash: &Hash) -> Result<(crate::tx::BlockTx, Hash, u32), ChainError> {
        let entry = self
            .db
            .get(Prefix::TxToBlocks, tx_hash.as_bytes())?
            .ok_or(ChainError::NotFound)?;
        if entry.len() != 40 {
            return Err(ChainError::Malformed("tx index entry must be 40 bytes".into()));
        }
        let mut block_hash_bytes = [0u8; 32];
        block_hash_bytes.copy_from_slice(&entry[0..32]);
        let block_hash = Hash::from_bytes(block_hash_bytes);
        let index = u64::from_be_bytes(entry[32..40].try_into().unwrap()) as u32;
        let block = self.get_by_hash(&block_hash)?;
        let tx = block
            .user_txs
            .get(index as usize)
            .cloned()
            .ok_or_else(|| ChainError::Malformed("tx index out of range".into()))?;
        Ok((tx, block_hash, index))
    }

    /// Append a finalized block. A single atomic batch writes the block
    /// body plus every secondary index (§4.4: "writes are atomic per
    /// block").
    pub fn append(&self, block: &Block) -> Result<(), ChainError> {
        let _guard = self.append_lock.lock();
        let height = block.header.height;
        let hash = block.hash();
        let mut batch = Vec::new();
        batch.push((Prefix::Blocks, Self::height_key(height), block.to_bytes()));
        batch.push((
            Prefix::BlockHeightMaps,
            hash.as_bytes().to_vec(),
            height.to_be_bytes().to_vec(),
        ));
        for (index, tx) in block.user_txs.iter().enumerate() {
            let mut entry = Vec::with_capacity(40);
            entry.extend_from_slice(hash.as_bytes());
            entry.extend_from_slice(&(index as u64).to_be_bytes());
            batch.push((Prefix::TxToBlocks, tx.hash().as_bytes().to_vec(), entry));
        }
        self.db.put_batch(&batch)?;
        tracing::debug!(height, tx_count = block.user_txs.len(), %hash, "appended block");
        Ok(())
    }
}
