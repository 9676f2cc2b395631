//! In-memory providers for tests and for embedding the connector without a
//! real node or browser.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use num_bigint::BigUint;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::provider::{BrowserProvider, DocumentVisibility, NodeProvider, ProviderError};
use crate::wallet::types::{SignedTransaction, TxParams};

/// A node with scripted balances that records what it is sent.
pub struct MockNode {
    balances: Mutex<HashMap<String, BigUint>>,
    sent: Mutex<Vec<SignedTransaction>>,
    failure: Mutex<Option<ProviderError>>,
    balance_calls: AtomicUsize,
    held: watch::Sender<bool>,
}

impl MockNode {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            balance_calls: AtomicUsize::new(0),
            held: watch::channel(false).0,
        }
    }

    pub fn set_balance(&self, address: &str, balance: BigUint) {
        self.balances.lock().insert(address.to_lowercase(), balance);
    }

    /// Make every call fail with `error` until [`recover`](Self::recover).
    pub fn fail_with(&self, error: ProviderError) {
        *self.failure.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    /// Park balance requests until [`release`](Self::release).
    pub fn hold(&self) {
        self.held.send_replace(true);
    }

    pub fn release(&self) {
        self.held.send_replace(false);
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SignedTransaction> {
        self.sent.lock().clone()
    }

    fn check(&self) -> Result<(), ProviderError> {
        match self.failure.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for MockNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeProvider for MockNode {
    fn endpoint(&self) -> String {
        "mock://node".to_string()
    }

    async fn get_balance(&self, address: &str) -> Result<BigUint, ProviderError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        let mut held = self.held.subscribe();
        let _ = held.wait_for(|held| !*held).await;
        self.check()?;
        Ok(self
            .balances
            .lock()
            .get(&address.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<String, ProviderError> {
        self.check()?;
        self.sent.lock().push(tx.clone());
        Ok(tx.hash.clone())
    }
}

/// A scripted browser-injected wallet.
pub struct MockBrowser {
    accounts: Mutex<Vec<String>>,
    balances: Mutex<HashMap<String, BigUint>>,
    sent: Mutex<Vec<TxParams>>,
    failure: Mutex<Option<ProviderError>>,
    enable_calls: AtomicUsize,
}

impl MockBrowser {
    pub fn new(accounts: Vec<String>) -> Self {
        Self {
            accounts: Mutex::new(accounts),
            balances: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            enable_calls: AtomicUsize::new(0),
        }
    }

    /// Simulate the user switching accounts in the extension.
    pub fn set_accounts(&self, accounts: Vec<String>) {
        *self.accounts.lock() = accounts;
    }

    pub fn set_balance(&self, address: &str, balance: BigUint) {
        self.balances.lock().insert(address.to_lowercase(), balance);
    }

    pub fn fail_with(&self, error: ProviderError) {
        *self.failure.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    pub fn enable_calls(&self) -> usize {
        self.enable_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<TxParams> {
        self.sent.lock().clone()
    }

    fn check(&self) -> Result<(), ProviderError> {
        match self.failure.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BrowserProvider for MockBrowser {
    async fn enable(&self) -> Result<Vec<String>, ProviderError> {
        self.enable_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.accounts.lock().clone())
    }

    async fn accounts(&self) -> Result<Vec<String>, ProviderError> {
        self.check()?;
        Ok(self.accounts.lock().clone())
    }

    async fn balance(&self, address: &str) -> Result<BigUint, ProviderError> {
        self.check()?;
        Ok(self
            .balances
            .lock()
            .get(&address.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn send_transaction(&self, params: &TxParams) -> Result<String, ProviderError> {
        self.check()?;
        let mut sent = self.sent.lock();
        sent.push(params.clone());
        Ok(format!("0x{:064x}", sent.len()))
    }

    async fn personal_sign(&self, message: &str, address: &str) -> Result<String, ProviderError> {
        self.check()?;
        let digest = blake3::hash(format!("{address}:{message}").as_bytes());
        Ok(format!("0x{}", digest.to_hex()))
    }
}

/// Visibility that tests can flip.
#[derive(Debug)]
pub struct ToggleVisibility(AtomicBool);

impl ToggleVisibility {
    pub fn new(visible: bool) -> Self {
        Self(AtomicBool::new(visible))
    }

    pub fn set(&self, visible: bool) {
        self.0.store(visible, Ordering::SeqCst);
    }
}

impl DocumentVisibility for ToggleVisibility {
    fn is_visible(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
