//! Typed view over the persisted wallet records and the last selection.
//!
//! The record list is stored under [`WALLETS_KEY`] as a JSON array of JSON
//! strings, one serialized [`KeystoreRecord`] per address, in creation
//! order. Records are matched by their embedded lowercase address. There is
//! no locking: the last writer wins, which is why local wallets are
//! deduplicated per address before they ever get to write here.

use std::sync::Arc;

use tracing::warn;

use super::kv::{KeyValueStore, StoreError, StoreResult};
use crate::config::{LAST_SELECTED_TYPE_KEY, WALLETS_KEY};
use crate::crypto::keystore::{parse_record_address, KeystoreRecord};

#[derive(Clone)]
pub struct WalletStore {
    kv: Arc<dyn KeyValueStore>,
}

impl WalletStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Raw serialized records, in store order.
    pub fn records(&self) -> StoreResult<Vec<String>> {
        match self.kv.get(WALLETS_KEY)? {
            Some(json) => {
                serde_json::from_str(&json).map_err(|e| StoreError::Serialization(e.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    fn set_records(&self, records: &[String]) -> StoreResult<()> {
        let json =
            serde_json::to_string(records).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.kv.set(WALLETS_KEY, &json)
    }

    /// Addresses of every parseable record, in store order. Records whose
    /// address can't be read are skipped with a warning rather than failing
    /// discovery for every other wallet.
    pub fn addresses(&self) -> StoreResult<Vec<String>> {
        let mut out = Vec::new();
        for json in self.records()? {
            match parse_record_address(&json) {
                Ok(address) if !out.contains(&address) => out.push(address),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "skipping unreadable wallet record"),
            }
        }
        Ok(out)
    }

    /// The record for `address`, if one was ever saved.
    pub fn find(&self, address: &str) -> StoreResult<Option<KeystoreRecord>> {
        let address = address.to_lowercase();
        for json in self.records()? {
            if parse_record_address(&json).ok().as_deref() == Some(address.as_str()) {
                let record = KeystoreRecord::from_json(&json)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Replace the record with the same address in place, or append.
    pub fn upsert(&self, record: &KeystoreRecord) -> StoreResult<()> {
        let address = record.address.to_lowercase();
        let json = record
            .to_json()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut records = self.records()?;
        let index = records
            .iter()
            .position(|r| parse_record_address(r).ok().as_deref() == Some(address.as_str()));
        match index {
            Some(i) => records[i] = json,
            None => records.push(json),
        }
        self.set_records(&records)
    }

    /// Drop every record for `address`. Returns whether anything was removed.
    pub fn remove(&self, address: &str) -> StoreResult<bool> {
        let address = address.to_lowercase();
        let records = self.records()?;
        let before = records.len();
        let kept: Vec<String> = records
            .into_iter()
            .filter(|r| parse_record_address(r).ok().as_deref() != Some(address.as_str()))
            .collect();
        let removed = kept.len() != before;
        if removed {
            self.set_records(&kept)?;
        }
        Ok(removed)
    }

    pub fn last_selected_type(&self) -> StoreResult<Option<String>> {
        Ok(self.kv.get(LAST_SELECTED_TYPE_KEY)?.filter(|t| !t.is_empty()))
    }

    pub fn set_last_selected_type(&self, ty: &str) -> StoreResult<()> {
        self.kv.set(LAST_SELECTED_TYPE_KEY, ty)
    }
}
