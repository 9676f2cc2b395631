//! # Connector
//!
//! Owns the connection registry, the current selection, the polling
//! watchers and the notification registry.
//!
//! ## Lifecycle
//!
//! 1. [`ConnectorBuilder::build`] wires the providers and runs discovery:
//!    the extension connection (when a browser provider was given) followed
//!    by one local connection per persisted record.
//! 2. [`Connector::start_account_watchers`] arms an account loop and a
//!    balance loop for every connection.
//! 3. Selection changes, endpoint changes and wallet creation or deletion
//!    tear every watcher down and re-arm them, since the balance cadence
//!    depends on which connection is selected.
//! 4. [`Connector::shutdown`], or dropping the last handle, cancels
//!    everything.
//!
//! Every observable change (selection, address, balance, lock state set
//! through the connector) fires [`Connector::notify_all`].
//!
//! The connector is always handled as `Arc<Connector>`. Watcher tasks hold
//! only a weak reference, so they never keep it alive.

pub mod notify;
pub mod watcher;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;
use num_bigint::BigUint;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{ConnectorConfig, FAILURE_CHANNEL_CAPACITY};
use crate::provider::{
    AlwaysVisible, BrowserProvider, Disconnected, DocumentVisibility, NodeProvider,
};
use crate::storage::{KeyValueStore, StoreError, WalletStore};
use crate::wallet::{
    local_wallet_address, Connection, ExtensionWallet, LocalWalletRegistry, WalletError,
    WalletKind,
};

pub use notify::{Callback, Subscribers};
pub use watcher::{WatcherKey, WatcherKind, Watchers};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// A balance poll failed with an error the watcher does not expect.
///
/// Published on [`Connector::subscribe_failures`]. The loop that produced
/// it keeps running.
#[derive(Debug, Clone)]
pub struct WatcherFailure {
    pub connection: String,
    pub error: Arc<WalletError>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct ConnectorBuilder {
    kv: Arc<dyn KeyValueStore>,
    config: ConnectorConfig,
    node: Arc<dyn NodeProvider>,
    browser: Option<Arc<dyn BrowserProvider>>,
    visibility: Arc<dyn DocumentVisibility>,
}

impl ConnectorBuilder {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            config: ConnectorConfig::default(),
            node: Arc::new(Disconnected),
            browser: None,
            visibility: Arc::new(AlwaysVisible),
        }
    }

    pub fn config(mut self, config: ConnectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn node_provider(mut self, node: Arc<dyn NodeProvider>) -> Self {
        self.node = node;
        self
    }

    /// Register the browser-injected wallet. Without one there is no
    /// extension connection.
    pub fn browser_provider(mut self, browser: Arc<dyn BrowserProvider>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn visibility(mut self, visibility: Arc<dyn DocumentVisibility>) -> Self {
        self.visibility = visibility;
        self
    }

    /// Build the connector and run discovery. No watcher is started.
    pub fn build(self) -> ConnectorResult<Arc<Connector>> {
        let store = WalletStore::new(self.kv);
        let locals = LocalWalletRegistry::new(
            store.clone(),
            self.node,
            self.config.kdf,
            self.config.auto_lock_timeout,
        );
        let extension = self.browser.map(|b| Arc::new(ExtensionWallet::new(b)));
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);

        let connector = Arc::new_cyclic(|me| Connector {
            me: me.clone(),
            config: self.config,
            store,
            locals,
            extension,
            visibility: self.visibility,
            registry: RwLock::new(Registry::default()),
            watchers: Watchers::new(),
            watching: AtomicBool::new(false),
            subscribers: Subscribers::new(),
            failures,
        });
        connector.discover()?;
        Ok(connector)
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Registry {
    connections: HashMap<String, Connection>,
    /// Identities in discovery order: extension first, then store order.
    order: Vec<String>,
    selected: Option<String>,
}

impl Registry {
    fn insert(&mut self, connection: Connection) {
        let ty = connection.connection_type();
        if self.connections.insert(ty.clone(), connection).is_none() {
            self.order.push(ty);
        }
    }
}

pub struct Connector {
    me: Weak<Connector>,
    config: ConnectorConfig,
    store: WalletStore,
    locals: LocalWalletRegistry,
    extension: Option<Arc<ExtensionWallet>>,
    visibility: Arc<dyn DocumentVisibility>,
    registry: RwLock<Registry>,
    watchers: Watchers,
    watching: AtomicBool,
    subscribers: Subscribers,
    failures: broadcast::Sender<WatcherFailure>,
}

impl Connector {
    pub fn builder(kv: Arc<dyn KeyValueStore>) -> ConnectorBuilder {
        ConnectorBuilder::new(kv)
    }

    // -- discovery and watchers ---------------------------------------------

    /// Rebuild the registry from the store and the extension, then settle
    /// the selection: the current one if still registered, else the
    /// persisted one, else the first connection.
    pub fn discover(&self) -> ConnectorResult<()> {
        let locals = self.locals.list()?;
        let persisted = self.store.last_selected_type()?;

        let mut registry = self.registry.write();
        registry.connections.clear();
        registry.order.clear();
        if let Some(extension) = &self.extension {
            registry.insert(Connection::Extension(Arc::clone(extension)));
        }
        for wallet in locals {
            registry.insert(Connection::Local(wallet));
        }

        let selected = [registry.selected.take(), persisted]
            .into_iter()
            .flatten()
            .find(|ty| registry.connections.contains_key(ty))
            .or_else(|| registry.order.first().cloned());
        registry.selected = selected;

        info!(
            connections = registry.order.len(),
            selected = ?registry.selected,
            "connections discovered"
        );
        Ok(())
    }

    /// Discover, then arm an account and a balance loop per connection.
    pub fn start_account_watchers(&self) -> ConnectorResult<()> {
        self.watching.store(true, Ordering::SeqCst);
        self.discover()?;
        for ty in self.supported_types() {
            self.arm(&ty, WatcherKind::Account);
            self.arm(&ty, WatcherKind::Balance);
        }
        Ok(())
    }

    /// Cancel every loop and set everything up again. Only re-arms if
    /// watchers were started.
    pub fn refresh_watchers(&self) -> ConnectorResult<()> {
        self.clear_timers();
        if self.watching.load(Ordering::SeqCst) {
            self.start_account_watchers()
        } else {
            self.discover()
        }
    }

    pub fn clear_timers(&self) {
        self.watchers.cancel_all();
    }

    /// Stop polling for good. In-flight polls finish but are not applied.
    pub fn shutdown(&self) {
        self.watching.store(false, Ordering::SeqCst);
        self.clear_timers();
        info!("connector shut down");
    }

    pub fn watchers(&self) -> &Watchers {
        &self.watchers
    }

    fn arm(&self, ty: &str, kind: WatcherKind) {
        let me = self.me.clone();
        let connection = ty.to_string();
        self.watchers.arm(WatcherKey::new(ty, kind), move |token| {
            let me = me.clone();
            let connection = connection.clone();
            async move {
                let connector = me.upgrade()?;
                match kind {
                    WatcherKind::Account => connector.account_tick(&connection, &token).await,
                    WatcherKind::Balance => connector.balance_tick(&connection, &token).await,
                }
            }
        });
    }

    async fn account_tick(&self, ty: &str, token: &CancellationToken) -> Option<Duration> {
        let connection = self.connection(ty)?;
        let accounts = connection.accounts().await;
        if token.is_cancelled() {
            return None;
        }
        self.apply_accounts(&connection, accounts);
        Some(self.config.account_interval)
    }

    async fn balance_tick(&self, ty: &str, token: &CancellationToken) -> Option<Duration> {
        let connection = self.connection(ty)?;
        let result = connection.load_balance().await;
        if token.is_cancelled() {
            return None;
        }
        if let Err(e) = self.apply_balance(&connection, result) {
            error!(connection = %ty, error = %e, "balance poll failed");
            let _ = self.failures.send(WatcherFailure {
                connection: ty.to_string(),
                error: Arc::new(e),
            });
        }
        Some(self.balance_poll_interval(ty))
    }

    // -- polling ------------------------------------------------------------

    /// One account poll for `ty`. Returns whether the cached address
    /// changed.
    pub async fn poll_account(&self, ty: &str) -> bool {
        let Some(connection) = self.connection(ty) else {
            return false;
        };
        let accounts = connection.accounts().await;
        self.apply_accounts(&connection, accounts)
    }

    /// One balance poll for `ty`. Returns whether the cached balance
    /// changed.
    ///
    /// # Errors
    ///
    /// Any error other than the expected locked or unbound ones. The cache
    /// is left untouched.
    pub async fn poll_balance(&self, ty: &str) -> Result<bool, WalletError> {
        let Some(connection) = self.connection(ty) else {
            return Ok(false);
        };
        let result = connection.load_balance().await;
        self.apply_balance(&connection, result)
    }

    /// Poll every connection's account and balance once, concurrently.
    ///
    /// Returns the fatal balance errors, keyed by identity.
    pub async fn poll_all(&self) -> Vec<(String, WalletError)> {
        let types = self.supported_types();
        join_all(types.iter().map(|ty| self.poll_account(ty))).await;
        join_all(types.iter().map(|ty| async move {
            self.poll_balance(ty).await.err().map(|e| (ty.clone(), e))
        }))
        .await
        .into_iter()
        .flatten()
        .collect()
    }

    fn apply_accounts(&self, connection: &Connection, accounts: Vec<String>) -> bool {
        let next = accounts.into_iter().next().map(|a| a.to_lowercase());
        if next == connection.address() {
            return false;
        }
        debug!(
            connection = %connection.connection_type(),
            address = ?next,
            "active account changed"
        );
        connection.set_address(next);
        self.notify_all();
        true
    }

    fn apply_balance(
        &self,
        connection: &Connection,
        result: Result<BigUint, WalletError>,
    ) -> Result<bool, WalletError> {
        match result {
            Ok(balance) if balance != connection.balance() => {
                debug!(
                    connection = %connection.connection_type(),
                    balance = %balance,
                    "balance changed"
                );
                connection.set_balance(balance);
                self.notify_all();
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) if e.is_benign() => {
                debug!(connection = %connection.connection_type(), reason = %e, "balance not available");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Fast for the selected connection while the document is visible,
    /// slow otherwise.
    pub fn balance_poll_interval(&self, ty: &str) -> Duration {
        let selected = self.registry.read().selected.as_deref() == Some(ty);
        if selected && self.visibility.is_visible() {
            self.config.balance_interval_fast
        } else {
            self.config.balance_interval_slow
        }
    }

    // -- registry queries ---------------------------------------------------

    /// Every registered identity the host can use, in discovery order.
    pub fn supported_types(&self) -> Vec<String> {
        let registry = self.registry.read();
        registry
            .order
            .iter()
            .filter(|ty| registry.connections.get(*ty).is_some_and(|c| c.is_supported()))
            .cloned()
            .collect()
    }

    /// Identities of one wallet kind, in discovery order.
    pub fn wallet_types(&self, kind: WalletKind) -> Vec<String> {
        let registry = self.registry.read();
        registry
            .order
            .iter()
            .filter(|ty| registry.connections.get(*ty).is_some_and(|c| c.kind() == kind))
            .cloned()
            .collect()
    }

    pub fn connection(&self, ty: &str) -> Option<Connection> {
        self.registry.read().connections.get(ty).cloned()
    }

    pub fn selected_type(&self) -> Option<String> {
        self.registry.read().selected.clone()
    }

    pub fn selected_connection(&self) -> Option<Connection> {
        let registry = self.registry.read();
        registry
            .selected
            .as_ref()
            .and_then(|ty| registry.connections.get(ty))
            .cloned()
    }

    fn resolve(&self, ty: Option<&str>) -> Option<Connection> {
        match ty {
            Some(ty) => self.connection(ty),
            None => self.selected_connection(),
        }
    }

    /// Cached address of `ty`, or of the selected connection.
    pub fn address(&self, ty: Option<&str>) -> Option<String> {
        self.resolve(ty).and_then(|c| c.address())
    }

    /// Cached balance of `ty`, or of the selected connection.
    pub fn balance(&self, ty: Option<&str>) -> Option<BigUint> {
        self.resolve(ty).map(|c| c.balance())
    }

    pub fn locals(&self) -> &LocalWalletRegistry {
        &self.locals
    }

    // -- mutations ----------------------------------------------------------

    /// Select `ty`. Returns `Ok(false)` without side effects when `ty` is
    /// already selected or not registered.
    ///
    /// Selecting the extension runs its enable flow first; if that fails
    /// the selection is unchanged.
    pub async fn select_connection(&self, ty: &str) -> ConnectorResult<bool> {
        let connection = {
            let registry = self.registry.read();
            if registry.selected.as_deref() == Some(ty) {
                return Ok(false);
            }
            match registry.connections.get(ty) {
                Some(connection) => connection.clone(),
                None => {
                    debug!(connection = %ty, "ignoring selection of unknown connection");
                    return Ok(false);
                }
            }
        };

        if let Some(extension) = connection.as_extension() {
            extension.enable().await?;
        }

        self.store.set_last_selected_type(ty)?;
        {
            let mut registry = self.registry.write();
            if !registry.connections.contains_key(ty) {
                return Ok(false);
            }
            registry.selected = Some(ty.to_string());
        }
        info!(connection = %ty, "connection selected");

        self.refresh_watchers()?;
        self.notify_all();
        Ok(true)
    }

    /// Unlock the selected connection if it is a local wallet. Returns
    /// `Ok(false)` when there is nothing to unlock.
    pub async fn unlock(&self, password: &str) -> ConnectorResult<bool> {
        let Some(wallet) = self
            .selected_connection()
            .and_then(|c| c.as_local().cloned())
        else {
            return Ok(false);
        };
        wallet.unlock(password).await?;
        self.notify_all();
        Ok(true)
    }

    /// Point local wallets at a new node and restart polling.
    pub fn set_node_provider(&self, node: Arc<dyn NodeProvider>) -> ConnectorResult<()> {
        self.locals.set_node_provider(node);
        self.refresh_watchers()
    }

    pub async fn create_local_wallet(&self, password: &str) -> ConnectorResult<Connection> {
        let wallet = self.locals.create_random(password).await?;
        self.refresh_watchers()?;
        self.notify_all();
        Ok(Connection::Local(wallet))
    }

    pub async fn import_local_wallet(
        &self,
        secret_hex: &str,
        password: &str,
    ) -> ConnectorResult<Connection> {
        let wallet = self.locals.import(secret_hex, password).await?;
        self.refresh_watchers()?;
        self.notify_all();
        Ok(Connection::Local(wallet))
    }

    /// Delete a local wallet by identity. If it was selected, selection
    /// falls back like at discovery. Returns `false` for anything that
    /// isn't a persisted local wallet.
    pub fn delete_local_wallet(&self, ty: &str) -> ConnectorResult<bool> {
        let Some(address) = local_wallet_address(ty) else {
            return Ok(false);
        };
        self.watchers.cancel_connection(ty);
        let removed = self.locals.delete(address)?;
        self.refresh_watchers()?;
        self.notify_all();
        Ok(removed)
    }

    // -- notification -------------------------------------------------------

    pub fn subscribe<F>(&self, key: impl Into<String>, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribers.subscribe(key, callback);
    }

    pub fn unsubscribe(&self, key: &str) -> bool {
        self.subscribers.unsubscribe(key)
    }

    pub fn notify_all(&self) {
        self.subscribers.notify_all();
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<WatcherFailure> {
        self.failures.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::local_wallet_type;
    use crate::crypto::{KdfParams, KeystoreRecord, WalletKeypair};
    use crate::provider::ProviderError;
    use crate::storage::MemoryStore;
    use crate::testing::{MockBrowser, MockNode, ToggleVisibility};
    use std::sync::atomic::AtomicUsize;

    const EXT_ACCOUNT: &str = "0x1111111111111111111111111111111111111111";

    struct Harness {
        kv: Arc<MemoryStore>,
        node: Arc<MockNode>,
        browser: Arc<MockBrowser>,
        visibility: Arc<ToggleVisibility>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                kv: Arc::new(MemoryStore::new()),
                node: Arc::new(MockNode::new()),
                browser: Arc::new(MockBrowser::new(vec![EXT_ACCOUNT.to_string()])),
                visibility: Arc::new(ToggleVisibility::new(true)),
            }
        }

        /// Persist a wallet under `password` and return its identity.
        fn saved_wallet(&self, password: &str) -> String {
            let kp = WalletKeypair::generate();
            let record = KeystoreRecord::encrypt(&kp, password, &KdfParams::fast()).unwrap();
            WalletStore::new(self.kv.clone()).upsert(&record).unwrap();
            local_wallet_type(&kp.address())
        }

        fn builder(&self) -> ConnectorBuilder {
            Connector::builder(self.kv.clone())
                .config(ConnectorConfig {
                    kdf: KdfParams::fast(),
                    ..ConnectorConfig::default()
                })
                .node_provider(self.node.clone())
                .visibility(self.visibility.clone())
        }

        fn with_extension(&self) -> Arc<Connector> {
            self.builder()
                .browser_provider(self.browser.clone())
                .build()
                .unwrap()
        }

        fn without_extension(&self) -> Arc<Connector> {
            self.builder().build().unwrap()
        }
    }

    fn notifications(connector: &Connector, key: &str) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        connector.subscribe(key, move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        hits
    }

    #[test]
    fn discovery_puts_extension_first_and_selects_it() {
        let h = Harness::new();
        let local = h.saved_wallet("pw");
        let connector = h.with_extension();

        assert_eq!(connector.supported_types(), vec!["EXTENSION".to_string(), local.clone()]);
        assert_eq!(connector.selected_type().as_deref(), Some("EXTENSION"));
        assert_eq!(connector.wallet_types(WalletKind::Local), vec![local]);
        assert!(connector.connection("Ledger:0x1").is_none());
    }

    #[test]
    fn discovery_without_anything_selects_nothing() {
        let h = Harness::new();
        let connector = h.without_extension();
        assert!(connector.supported_types().is_empty());
        assert!(connector.selected_type().is_none());
        assert!(connector.address(None).is_none());
    }

    #[test]
    fn persisted_selection_wins_when_valid() {
        let h = Harness::new();
        let local = h.saved_wallet("pw");
        WalletStore::new(h.kv.clone())
            .set_last_selected_type(&local)
            .unwrap();
        assert_eq!(h.with_extension().selected_type(), Some(local));

        WalletStore::new(h.kv.clone())
            .set_last_selected_type("Local-Wallet:0xgone")
            .unwrap();
        assert_eq!(h.with_extension().selected_type().as_deref(), Some("EXTENSION"));
    }

    #[tokio::test]
    async fn selection_is_idempotent_and_ignores_unknown() {
        let h = Harness::new();
        let local = h.saved_wallet("pw");
        let connector = h.with_extension();
        let hits = notifications(&connector, "ui");

        assert!(!connector.select_connection("EXTENSION").await.unwrap());
        assert!(!connector.select_connection("Local-Wallet:0xnope").await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(connector.selected_type().as_deref(), Some("EXTENSION"));

        assert!(connector.select_connection(&local).await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            WalletStore::new(h.kv.clone()).last_selected_type().unwrap(),
            Some(local)
        );
    }

    #[tokio::test]
    async fn selecting_extension_enables_it() {
        let h = Harness::new();
        let local = h.saved_wallet("pw");
        WalletStore::new(h.kv.clone())
            .set_last_selected_type(&local)
            .unwrap();
        let connector = h.with_extension();

        assert!(connector.select_connection("EXTENSION").await.unwrap());
        assert_eq!(h.browser.enable_calls(), 1);
        assert_eq!(connector.address(None).as_deref(), Some(EXT_ACCOUNT));
    }

    #[tokio::test]
    async fn rejected_enable_keeps_selection() {
        let h = Harness::new();
        let local = h.saved_wallet("pw");
        WalletStore::new(h.kv.clone())
            .set_last_selected_type(&local)
            .unwrap();
        let connector = h.with_extension();
        h.browser.fail_with(ProviderError::Rejected);

        assert!(connector.select_connection("EXTENSION").await.is_err());
        assert_eq!(connector.selected_type(), Some(local));
    }

    #[test]
    fn balance_cadence_follows_selection_and_visibility() {
        let h = Harness::new();
        let local = h.saved_wallet("pw");
        let connector = h.with_extension();
        let config = ConnectorConfig::default();

        assert_eq!(connector.balance_poll_interval("EXTENSION"), config.balance_interval_fast);
        assert_eq!(connector.balance_poll_interval(&local), config.balance_interval_slow);

        h.visibility.set(false);
        assert_eq!(connector.balance_poll_interval("EXTENSION"), config.balance_interval_slow);
        assert_eq!(
            config.balance_interval_slow,
            config.balance_interval_fast * 100
        );
    }

    #[tokio::test]
    async fn unlock_only_applies_to_selected_local_wallet() {
        let h = Harness::new();
        let local = h.saved_wallet("pw");
        let connector = h.with_extension();

        assert!(!connector.unlock("pw").await.unwrap());

        connector.select_connection(&local).await.unwrap();
        assert!(matches!(
            connector.unlock("wrong").await,
            Err(ConnectorError::Wallet(WalletError::Decrypt(_)))
        ));
        assert!(connector.connection(&local).unwrap().is_locked());

        assert!(connector.unlock("pw").await.unwrap());
        assert!(!connector.connection(&local).unwrap().is_locked());
    }

    #[tokio::test]
    async fn benign_errors_are_swallowed_and_fatal_ones_returned() {
        let h = Harness::new();
        let local = h.saved_wallet("pw");
        let connector = h.without_extension();

        // Locked: expected, nothing changes.
        assert!(!connector.poll_balance(&local).await.unwrap());

        connector.unlock("pw").await.unwrap();
        h.node.fail_with(ProviderError::Transport("down".into()));
        assert!(matches!(
            connector.poll_balance(&local).await,
            Err(WalletError::Provider(ProviderError::Transport(_)))
        ));
        assert_eq!(connector.balance(None), Some(BigUint::default()));
    }

    #[tokio::test]
    async fn unchanged_balance_does_not_notify() {
        let h = Harness::new();
        let local = h.saved_wallet("pw");
        let connector = h.without_extension();
        connector.unlock("pw").await.unwrap();
        let address = connector.address(None).unwrap();
        let hits = notifications(&connector, "ui");

        h.node.set_balance(&address, BigUint::from(10u32));
        assert!(connector.poll_balance(&local).await.unwrap());
        assert!(!connector.poll_balance(&local).await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn account_poll_tracks_extension_switches() {
        let h = Harness::new();
        let connector = h.with_extension();
        let hits = notifications(&connector, "ui");

        assert!(connector.poll_account("EXTENSION").await);
        assert_eq!(connector.address(None).as_deref(), Some(EXT_ACCOUNT));
        assert!(!connector.poll_account("EXTENSION").await);

        h.browser
            .set_accounts(vec!["0x2222222222222222222222222222222222222222".into()]);
        assert!(connector.poll_account("EXTENSION").await);

        // Provider failure reads as no account.
        h.browser.fail_with(ProviderError::NotConnected);
        assert!(connector.poll_account("EXTENSION").await);
        assert!(connector.address(None).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_poll_errors_are_published_and_polling_continues() {
        let h = Harness::new();
        h.saved_wallet("pw");
        let connector = h.without_extension();
        connector.unlock("pw").await.unwrap();
        let address = connector.address(None).unwrap();
        let mut failures = connector.subscribe_failures();

        h.node.fail_with(ProviderError::Transport("down".into()));
        connector.start_account_watchers().unwrap();

        let failure = failures.recv().await.unwrap();
        assert_eq!(Some(failure.connection), connector.selected_type());

        h.node.recover();
        h.node.set_balance(&address, BigUint::from(5u32));
        tokio::time::sleep(ConnectorConfig::default().balance_interval_fast + Duration::from_millis(10))
            .await;
        assert_eq!(connector.balance(None), Some(BigUint::from(5u32)));
    }

    #[tokio::test(start_paused = true)]
    async fn torn_down_poll_is_discarded() {
        let h = Harness::new();
        h.saved_wallet("pw");
        let connector = h.without_extension();
        connector.unlock("pw").await.unwrap();
        let address = connector.address(None).unwrap();

        h.node.hold();
        connector.start_account_watchers().unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(h.node.balance_calls(), 1);

        h.node.set_balance(&address, BigUint::from(7u32));
        connector.shutdown();
        h.node.release();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(connector.balance(None), Some(BigUint::default()));
        assert_eq!(h.node.balance_calls(), 1);
        assert!(connector.watchers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn balance_loop_speeds_up_when_selected() {
        let h = Harness::new();
        let local = h.saved_wallet("pw");
        let connector = h.with_extension();
        connector
            .connection(&local)
            .unwrap()
            .as_local()
            .unwrap()
            .unlock("pw")
            .await
            .unwrap();

        connector.start_account_watchers().unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.node.balance_calls(), 1);

        connector.select_connection(&local).await.unwrap();
        tokio::time::sleep(Duration::from_millis(6_500)).await;
        assert_eq!(h.node.balance_calls(), 4);
    }

    #[tokio::test]
    async fn poll_all_refreshes_every_connection() {
        let h = Harness::new();
        let local = h.saved_wallet("pw");
        let connector = h.with_extension();
        h.browser.set_balance(EXT_ACCOUNT, BigUint::from(3u32));

        let failures = connector.poll_all().await;
        assert!(failures.is_empty());
        assert_eq!(connector.address(Some("EXTENSION")).as_deref(), Some(EXT_ACCOUNT));
        assert_eq!(connector.balance(Some("EXTENSION")), Some(BigUint::from(3u32)));
        // Locked local wallet: benign, nothing reported.
        assert_eq!(connector.balance(Some(&local)), Some(BigUint::default()));

        connector
            .connection(&local)
            .unwrap()
            .as_local()
            .unwrap()
            .unlock("pw")
            .await
            .unwrap();
        h.node.fail_with(ProviderError::Transport("gone".into()));
        let failures = connector.poll_all().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, local);
    }

    #[tokio::test]
    async fn deleting_selected_wallet_falls_back() {
        let h = Harness::new();
        let first = h.saved_wallet("pw");
        let second = h.saved_wallet("pw");
        let connector = h.without_extension();
        connector.select_connection(&second).await.unwrap();

        assert!(connector.delete_local_wallet(&second).unwrap());
        assert_eq!(connector.selected_type(), Some(first));
        assert!(connector.connection(&second).is_none());
        assert!(!connector.delete_local_wallet("EXTENSION").unwrap());
    }

    #[tokio::test]
    async fn created_and_imported_wallets_join_the_registry() {
        let h = Harness::new();
        let connector = h.with_extension();

        let created = connector.create_local_wallet("pw").await.unwrap();
        assert!(!created.is_locked());
        let kp = WalletKeypair::generate();
        let imported = connector
            .import_local_wallet(&hex::encode(kp.secret_key_bytes()), "pw")
            .await
            .unwrap();
        assert_eq!(imported.address(), Some(kp.address()));

        assert_eq!(connector.wallet_types(WalletKind::Local).len(), 2);
        assert_eq!(connector.selected_type().as_deref(), Some("EXTENSION"));
    }

    #[tokio::test]
    async fn dropping_connector_cancels_watchers() {
        let h = Harness::new();
        let connector = h.with_extension();
        connector.start_account_watchers().unwrap();
        assert_eq!(connector.watchers().len(), 2);

        let weak = Arc::downgrade(&connector);
        drop(connector);
        assert!(weak.upgrade().is_none());
    }
}
