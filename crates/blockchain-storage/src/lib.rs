//! The persistent key-value store contract (§6). The core never talks to
//! RocksDB directly; it only ever sees [`KvStore`], so tests can run against
//! [`memory::MemoryStore`] and production nodes against [`rocks::RocksStore`].

pub mod memory;
pub mod prefix;
pub mod rocks;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A logical table partition. Mirrors §6's `prefixes` list.
pub use prefix::Prefix;

/// Crash-safe key-value store, partitioned into logical tables by [`Prefix`].
/// All multi-key operations are atomic at batch granularity.
pub trait KvStore: Send + Sync {
    fn get(&self, prefix: Prefix, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn has(&self, prefix: Prefix, key: &[u8]) -> Result<bool> {
        Ok(self.get(prefix, key)?.is_some())
    }
    fn put(&self, prefix: Prefix, key: &[u8], value: &[u8]) -> Result<()>;
    fn del(&self, prefix: Prefix, key: &[u8]) -> Result<()>;

    /// Atomically apply every write in `batch`.
    fn put_batch(&self, batch: &[(Prefix, Vec<u8>, Vec<u8>)]) -> Result<()>;

    /// Read several keys from the same prefix. Missing keys are omitted.
    fn get_batch(&self, prefix: Prefix, keys: &[Vec<u8>]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(prefix, key)? {
                out.push((key.clone(), value));
            }
        }
        Ok(out)
    }

    /// List keys within a prefix, optionally bounded by `[start, end)`.
    fn get_keys(
        &self,
        prefix: Prefix,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<Vec<Vec<u8>>>;
}
