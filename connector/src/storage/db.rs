//! # SledStore: On-Disk Key-Value Store
//!
//! Native backing for [`KeyValueStore`], built on sled's embedded B+ tree.
//! Everything lives in a single named tree, `kv`, with UTF-8 keys and
//! values. Every write is flushed before returning so a crash right after
//! `save()` never loses a freshly created wallet.

use sled::{Db, Tree};
use std::path::Path;

use super::kv::{KeyValueStore, StoreError, StoreResult};

const KV_TREE: &str = "kv";

#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    kv: Tree,
}

impl SledStore {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory sled instance, dropped with the store. For tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let kv = db.open_tree(KV_TREE)?;
        Ok(Self { db, kv })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.kv.get(key.as_bytes())? {
            Some(bytes) => {
                let value = String::from_utf8(bytes.to_vec())
                    .map_err(|_| StoreError::Encoding(key.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.kv.insert(key.as_bytes(), value.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.kv.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_store_roundtrip() {
        let store = SledStore::open_temporary().unwrap();
        store.set("Connector:lastSelectedType", "EXTENSION").unwrap();
        assert_eq!(
            store.get("Connector:lastSelectedType").unwrap().as_deref(),
            Some("EXTENSION")
        );
        store.remove("Connector:lastSelectedType").unwrap();
        assert!(store.get("Connector:lastSelectedType").unwrap().is_none());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.set("k", "persisted").unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("persisted"));
    }
}
