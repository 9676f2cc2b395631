//! # Local Wallet Registry
//!
//! The single owner of live [`LocalWallet`] instances, keyed by lowercase
//! address. Asking for an address twice yields the same instance, so
//! watchers, the connector and callers all observe one object and there
//! is never more than one writer per persisted record.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::info;

use super::error::WalletError;
use super::local::{seal_record, LocalWallet, NodeSlot};
use crate::crypto::encryption::KdfParams;
use crate::crypto::keys::WalletKeypair;
use crate::provider::NodeProvider;
use crate::storage::{StoreResult, WalletStore};

pub struct LocalWalletRegistry {
    store: WalletStore,
    node: NodeSlot,
    kdf: KdfParams,
    auto_lock: Duration,
    cache: DashMap<String, Arc<LocalWallet>>,
}

impl LocalWalletRegistry {
    pub fn new(
        store: WalletStore,
        node: Arc<dyn NodeProvider>,
        kdf: KdfParams,
        auto_lock: Duration,
    ) -> Self {
        Self {
            store,
            node: Arc::new(RwLock::new(node)),
            kdf,
            auto_lock,
            cache: DashMap::new(),
        }
    }

    /// One wallet per persisted record, in store order.
    pub fn list(&self) -> StoreResult<Vec<Arc<LocalWallet>>> {
        Ok(self
            .store
            .addresses()?
            .iter()
            .map(|address| self.get(address))
            .collect())
    }

    /// The instance for `address`, created locked on first request.
    pub fn get(&self, address: &str) -> Arc<LocalWallet> {
        let key = address.to_lowercase();
        self.cache
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(LocalWallet::new(
                    &key,
                    self.store.clone(),
                    Arc::clone(&self.node),
                    self.kdf,
                    self.auto_lock,
                ))
            })
            .value()
            .clone()
    }

    /// The instance for `address` if one was already handed out.
    pub fn cached(&self, address: &str) -> Option<Arc<LocalWallet>> {
        self.cache
            .get(&address.to_lowercase())
            .map(|entry| entry.value().clone())
    }

    /// Generate a new key pair, persist it under `password` and return
    /// the wallet unlocked.
    pub async fn create_random(&self, password: &str) -> Result<Arc<LocalWallet>, WalletError> {
        self.register(WalletKeypair::generate(), password).await
    }

    /// Bind a hex secret key, persist it under `password` and return the
    /// wallet unlocked. Importing a known address re-encrypts its record.
    pub async fn import(
        &self,
        secret_hex: &str,
        password: &str,
    ) -> Result<Arc<LocalWallet>, WalletError> {
        let keypair = WalletKeypair::from_hex(secret_hex)?;
        self.register(keypair, password).await
    }

    /// Persist first, bind second: a failed write leaves any cached
    /// instance exactly as it was.
    async fn register(
        &self,
        keypair: WalletKeypair,
        password: &str,
    ) -> Result<Arc<LocalWallet>, WalletError> {
        let address = keypair.address();
        let record = seal_record(keypair.clone(), password, self.kdf).await?;
        self.store.upsert(&record)?;

        let wallet = self.get(&address);
        wallet.bind(keypair);
        info!(address = %address, "local wallet registered");
        Ok(wallet)
    }

    /// Lock `address`, evict it and remove its persisted record.
    ///
    /// Returns `false` if there was no record to remove.
    pub fn delete(&self, address: &str) -> Result<bool, WalletError> {
        let key = address.to_lowercase();
        if let Some((_, wallet)) = self.cache.remove(&key) {
            wallet.forget();
        }
        let removed = self.store.remove(&key)?;
        if removed {
            info!(address = %key, "local wallet deleted");
        }
        Ok(removed)
    }

    /// Point every local wallet, unlocked ones included, at `node`.
    pub fn set_node_provider(&self, node: Arc<dyn NodeProvider>) {
        info!(endpoint = %node.endpoint(), "node provider changed");
        *self.node.write() = node;
    }

    pub fn node_endpoint(&self) -> String {
        self.node.read().endpoint()
    }

    pub fn store(&self) -> &WalletStore {
        &self.store
    }
}
