//! # Connector Configuration & Constants
//!
//! Every cadence, timeout, and well-known storage key used by the connector
//! lives here. The poll intervals in particular are user-visible: they decide
//! how quickly a new account or an incoming payment shows up on screen, and
//! how much RPC traffic a forgotten background tab generates.
//!
//! The constants are the defaults. [`ConnectorConfig`] carries the values a
//! running connector actually uses, so tests and embedders can shrink them.

use std::time::Duration;

use crate::crypto::encryption::KdfParams;

// ---------------------------------------------------------------------------
// Connection Identities
// ---------------------------------------------------------------------------

/// Identity of the browser-extension connection. There is only ever one.
pub const EXTENSION_TYPE: &str = "EXTENSION";

/// Prefix of every local wallet identity. The lowercase address follows it,
/// e.g. `Local-Wallet:0x5b3a...`.
pub const LOCAL_WALLET_TYPE_PREFIX: &str = "Local-Wallet:";

/// Display name for local (encrypted, password-unlocked) wallets.
pub const LOCAL_WALLET_NAME: &str = "Local Wallet";

/// Display name for the browser-injected wallet.
pub const EXTENSION_WALLET_NAME: &str = "Extension Wallet";

/// Display name for identities that match neither kind.
pub const UNKNOWN_WALLET_NAME: &str = "Unknown Wallet";

// ---------------------------------------------------------------------------
// Persisted Store Keys
// ---------------------------------------------------------------------------

/// Store key holding the JSON list of encrypted wallet records.
pub const WALLETS_KEY: &str = "LocalWallets";

/// Store key holding the identity of the last selected connection.
pub const LAST_SELECTED_TYPE_KEY: &str = "Connector:lastSelectedType";

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// How often every connection re-reads its authorized accounts.
pub const ACCOUNT_POLL_INTERVAL: Duration = Duration::from_millis(3_000);

/// Balance cadence for the selected connection while the document is visible.
pub const BALANCE_POLL_FAST: Duration = Duration::from_millis(3_000);

/// Balance cadence for everything else. 100x slower than the fast rate;
/// background connections still converge, just without hammering the node.
pub const BALANCE_POLL_SLOW: Duration = Duration::from_millis(300_000);

/// Inactivity window after which an unlocked local wallet drops its key.
pub const AUTO_LOCK_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Capacity of the watcher failure broadcast channel.
pub const FAILURE_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. Twelve, always twelve.
pub const AES_NONCE_LENGTH: usize = 12;

/// Length of the random salt fed to scrypt for each keystore record.
pub const KDF_SALT_LENGTH: usize = 32;

/// Default scrypt cost: log2(N) = 14, r = 8, p = 1.
pub const SCRYPT_LOG_N: u8 = 14;
pub const SCRYPT_R: u32 = 8;
pub const SCRYPT_P: u32 = 1;

/// Address length in bytes (the tail of the public key digest).
pub const ADDRESS_LENGTH: usize = 20;

/// Keystore record format version.
pub const KEYSTORE_VERSION: u32 = 3;

// ---------------------------------------------------------------------------
// ConnectorConfig
// ---------------------------------------------------------------------------

/// Tunables for a running connector.
///
/// `Default` matches the constants above. Tests typically swap in
/// [`KdfParams::fast`] so unlocking doesn't burn half a second of CPU.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Delay between account polls, per connection.
    pub account_interval: Duration,

    /// Balance cadence for the selected connection in a visible document.
    pub balance_interval_fast: Duration,

    /// Balance cadence for every other connection, or a hidden document.
    pub balance_interval_slow: Duration,

    /// Auto-lock window for unlocked local wallets.
    pub auto_lock_timeout: Duration,

    /// Key derivation cost used when local wallets are (re-)encrypted.
    pub kdf: KdfParams,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            account_interval: ACCOUNT_POLL_INTERVAL,
            balance_interval_fast: BALANCE_POLL_FAST,
            balance_interval_slow: BALANCE_POLL_SLOW,
            auto_lock_timeout: AUTO_LOCK_TIMEOUT,
            kdf: KdfParams::default(),
        }
    }
}

/// Builds the identity string for a local wallet address.
pub fn local_wallet_type(address: &str) -> String {
    format!("{}{}", LOCAL_WALLET_TYPE_PREFIX, address.to_lowercase())
}
