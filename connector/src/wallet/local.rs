//! # Local Wallet
//!
//! A wallet whose secret key lives encrypted in the persisted store and is
//! only held in memory while unlocked.
//!
//! ## State machine
//!
//! ```text
//!            unlock(pw) ok
//!   Locked ───────────────────▶ Unlocked ──┐
//!     ▲                            │       │ unlock(pw) ok
//!     │  lock() / auto-lock timer  │       │ (re-arms timer)
//!     └────────────────────────────┘ ◀─────┘
//! ```
//!
//! The key pair is present if and only if the wallet is unlocked. A failed
//! unlock leaves the wallet exactly as it was.
//!
//! Instances are only ever created through
//! [`LocalWalletRegistry`](super::registry::LocalWalletRegistry), which
//! keeps one instance per address.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::connection::Wallet;
use super::error::WalletError;
use super::types::{SentTransaction, SignedTransaction, TransactionResponse, TxParams};
use crate::config::{local_wallet_type, LOCAL_WALLET_NAME};
use crate::crypto::encryption::KdfParams;
use crate::crypto::keys::WalletKeypair;
use crate::crypto::keystore::KeystoreRecord;
use crate::provider::NodeProvider;
use crate::storage::WalletStore;

/// The node every local wallet talks to. Shared so an endpoint change
/// reaches unlocked wallets too.
pub(crate) type NodeSlot = Arc<RwLock<Arc<dyn NodeProvider>>>;

struct LocalState {
    address: Option<String>,
    balance: BigUint,
    keypair: Option<WalletKeypair>,
    /// Bumped on every unlock and lock; a timer only fires for its own epoch.
    lock_epoch: u64,
}

pub struct LocalWallet {
    /// Identity address. Never changes, even if the cache is cleared.
    owner: String,
    state: Mutex<LocalState>,
    lock_timer: Mutex<Option<JoinHandle<()>>>,
    store: WalletStore,
    node: NodeSlot,
    kdf: KdfParams,
    auto_lock: Duration,
}

impl LocalWallet {
    pub(crate) fn new(
        address: &str,
        store: WalletStore,
        node: NodeSlot,
        kdf: KdfParams,
        auto_lock: Duration,
    ) -> Self {
        let owner = address.to_lowercase();
        Self {
            state: Mutex::new(LocalState {
                address: Some(owner.clone()),
                balance: BigUint::default(),
                keypair: None,
                lock_epoch: 0,
            }),
            owner,
            lock_timer: Mutex::new(None),
            store,
            node,
            kdf,
            auto_lock,
        }
    }

    /// The address this wallet was created for.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Decrypt the saved record with `password` and bind the key.
    ///
    /// Every successful unlock restarts the auto-lock window. The KDF runs
    /// on the blocking pool, so this suspends until it finishes.
    ///
    /// # Errors
    ///
    /// - [`WalletError::WalletNotFound`] if no record was ever saved for
    ///   this address.
    /// - [`WalletError::Decrypt`] for a wrong password or corrupt record.
    pub async fn unlock(self: &Arc<Self>, password: &str) -> Result<(), WalletError> {
        let record = self
            .store
            .find(&self.owner)?
            .ok_or_else(|| WalletError::WalletNotFound {
                address: self.owner.clone(),
            })?;
        let keypair = open_record(record, password).await?;
        self.bind(keypair);
        info!(address = %self.owner, "local wallet unlocked");
        Ok(())
    }

    /// Drop the key. No-op when already locked.
    pub fn lock(&self) {
        if let Some(timer) = self.lock_timer.lock().take() {
            timer.abort();
        }
        let mut state = self.state.lock();
        state.lock_epoch += 1;
        if state.keypair.take().is_some() {
            info!(address = %self.owner, "local wallet locked");
        }
    }

    /// Re-encrypt the bound key under `password` and upsert its record.
    ///
    /// Returns `Ok(false)` when locked: there is nothing to save.
    pub async fn save(&self, password: &str) -> Result<bool, WalletError> {
        let Some(keypair) = self.state.lock().keypair.clone() else {
            return Ok(false);
        };
        let record = seal_record(keypair, password, self.kdf).await?;
        self.store.upsert(&record)?;
        debug!(address = %self.owner, "local wallet record saved");
        Ok(true)
    }

    /// Bind a freshly created or imported key pair and arm the auto-lock.
    pub(crate) fn bind(self: &Arc<Self>, keypair: WalletKeypair) {
        let epoch = {
            let mut state = self.state.lock();
            state.keypair = Some(keypair);
            state.address = Some(self.owner.clone());
            state.lock_epoch += 1;
            state.lock_epoch
        };
        self.arm_auto_lock(epoch);
    }

    /// Replace any pending auto-lock with a fresh one for `epoch`.
    fn arm_auto_lock(self: &Arc<Self>, epoch: u64) {
        let wallet = Arc::downgrade(self);
        let timeout = self.auto_lock;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(wallet) = wallet.upgrade() {
                wallet.expire(epoch);
            }
        });
        if let Some(previous) = self.lock_timer.lock().replace(timer) {
            previous.abort();
        }
    }

    fn expire(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.lock_epoch == epoch && state.keypair.take().is_some() {
            info!(address = %self.owner, "local wallet auto-locked after inactivity");
        }
    }

    /// Tear down in-memory key material ahead of deletion.
    pub(crate) fn forget(&self) {
        self.lock();
        self.state.lock().balance = BigUint::default();
    }

    fn keypair(&self) -> Result<WalletKeypair, WalletError> {
        self.state
            .lock()
            .keypair
            .clone()
            .ok_or(WalletError::NeedUnlockWallet)
    }

    fn node(&self) -> Arc<dyn NodeProvider> {
        Arc::clone(&self.node.read())
    }
}

/// Decrypt `record` on the blocking pool.
async fn open_record(
    record: KeystoreRecord,
    password: &str,
) -> Result<WalletKeypair, WalletError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || record.decrypt(&password))
        .await?
        .map_err(WalletError::Decrypt)
}

/// Encrypt `keypair` under `password` on the blocking pool.
pub(crate) async fn seal_record(
    keypair: WalletKeypair,
    password: &str,
    kdf: KdfParams,
) -> Result<KeystoreRecord, WalletError> {
    let password = password.to_string();
    let record =
        tokio::task::spawn_blocking(move || KeystoreRecord::encrypt(&keypair, &password, &kdf))
            .await??;
    Ok(record)
}

impl Drop for LocalWallet {
    fn drop(&mut self) {
        if let Some(timer) = self.lock_timer.get_mut().take() {
            timer.abort();
        }
    }
}

#[async_trait]
impl Wallet for LocalWallet {
    fn connection_type(&self) -> String {
        local_wallet_type(&self.owner)
    }

    fn wallet_name(&self) -> &'static str {
        LOCAL_WALLET_NAME
    }

    fn address(&self) -> Option<String> {
        self.state.lock().address.clone()
    }

    fn set_address(&self, address: Option<String>) {
        self.state.lock().address = address;
    }

    fn balance(&self) -> BigUint {
        self.state.lock().balance.clone()
    }

    fn set_balance(&self, balance: BigUint) {
        self.state.lock().balance = balance;
    }

    fn is_locked(&self) -> bool {
        self.state.lock().keypair.is_none()
    }

    async fn accounts(&self) -> Vec<String> {
        self.address().into_iter().collect()
    }

    async fn load_balance(&self) -> Result<BigUint, WalletError> {
        let keypair = self.keypair()?;
        let balance = self.node().get_balance(&keypair.address()).await?;
        Ok(balance)
    }

    async fn sign_message(&self, message: &str) -> Result<String, WalletError> {
        let keypair = self.keypair()?;
        Ok(keypair.sign_hex(message.as_bytes()))
    }

    async fn send_transaction(&self, params: TxParams) -> Result<SentTransaction, WalletError> {
        let keypair = self.keypair()?;
        if let Some(from) = &params.from {
            if from.to_lowercase() != self.owner {
                return Err(WalletError::InvalidTransaction(format!(
                    "from {} does not match wallet {}",
                    from, self.owner
                )));
            }
        }
        let signed = SignedTransaction::sign(&params, &keypair);
        let hash = self.node().send_transaction(&signed).await?;
        debug!(address = %self.owner, tx = %hash, "transaction submitted");

        Ok(SentTransaction::Response(TransactionResponse {
            hash,
            from: signed.from,
            to: signed.to,
            value: signed.value,
            submitted_at: chrono::Utc::now(),
        }))
    }
}
