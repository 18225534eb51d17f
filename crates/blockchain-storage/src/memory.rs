use crate::{KvStore, Prefix, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory `KvStore`, used by unit and integration tests; not durable.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<[BTreeMap<Vec<u8>, Vec<u8>>; 7]>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(prefix: Prefix) -> usize {
        Prefix::ALL.iter().position(|p| *p == prefix).expect("exhaustive")
    }
}

impl KvStore for MemoryStore {
    fn get(&self, prefix: Prefix, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.tables.read()[Self::index(prefix)].get(key).cloned())
    }

    fn put(&self, prefix: Prefix, key: &[u8], value: &[u8]) -> Result<()> {
        self.tables.write()[Self::index(prefix)].insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn del(&self, prefix: Prefix, key: &[u8]) -> Result<()> {
        self.tables.write()[Self::index(prefix)].remove(key);
        Ok(())
    }

    fn put_batch(&self, batch: &[(Prefix, Vec<u8>, Vec<u8>)]) -> Result<()> {
        let mut tables = self.tables.write();
        for (prefix, key, value) in batch {
            tables[Self::index(*prefix)].insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn get_keys(
        &self,
        prefix: Prefix,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<Vec<Vec<u8>>> {
        let tables = self.tables.read();
        let table = &tables[Self::index(prefix)];
        let iter: Box<dyn Iterator<Item = &Vec<u8>>> = match (start, end) {
            (Some(s), Some(e)) => Box::new(
                table
                    .range(s.to_vec()..e.to_vec())
                    .map(|(k, _)| k),
            ),
            (Some(s), None) => Box::new(table.range(s.to_vec()..).map(|(k, _)| k)),
            (None, Some(e)) => Box::new(table.range(..e.to_vec()).map(|(k, _)| k)),
            (None, None) => Box::new(table.keys()),
        };
        Ok(iter.cloned().collect())
    }
}
