use crate::{KvStore, Prefix, Result, StorageError};
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;

/// RocksDB-backed `KvStore`, one column family per [`Prefix`].
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        let cfs: Vec<ColumnFamilyDescriptor> = Prefix::ALL
            .iter()
            .map(|p| ColumnFamilyDescriptor::new(p.as_str(), Options::default()))
            .collect();
        let path = path.as_ref();
        let db = DB::open_cf_descriptors(&opts, path, cfs).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "failed to open rocksdb");
            StorageError::Backend(e.to_string())
        })?;
        tracing::info!(path = %path.display(), "opened rocksdb store");
        Ok(Self { db })
    }

    fn cf(&self, prefix: Prefix) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(prefix.as_str())
            .ok_or_else(|| StorageError::Backend(format!("missing column family {}", prefix.as_str())))
    }
}

impl KvStore for RocksStore {
    fn get(&self, prefix: Prefix, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(prefix)?;
        self.db
            .get_cf(cf, key)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn put(&self, prefix: Prefix, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.cf(prefix)?;
        self.db
            .put_cf(cf, key, value)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn del(&self, prefix: Prefix, key: &[u8]) -> Result<()> {
        let cf = self.cf(prefix)?;
        self.db
            .delete_cf(cf, key)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn put_batch(&self, batch: &[(Prefix, Vec<u8>, Vec<u8>)]) -> Result<()> {
        let mut wb = WriteBatch::default();
        for (prefix, key, value) in batch {
            let cf = self.cf(*prefix)?;
            wb.put_cf(cf, key, value);
        }
        self.db
            .write(wb)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn get_keys(
        &self,
        prefix: Prefix,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf(prefix)?;
        let mode = match start {
            Some(s) => IteratorMode::From(s, rocksdb::Direction::Forward),
            None => IteratorMode::Start,
        };
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            let (key, _) = item.map_err(|e| StorageError::Backend(e.to_string()))?;
            if let Some(e) = end {
                if key.as_ref() >= e {
                    break;
                }
            }
            out.push(key.to_vec());
        }
        Ok(out)
    }
}
