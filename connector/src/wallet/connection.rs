//! # The Wallet Capability Contract
//!
//! [`Wallet`] is what the connector polls and what callers sign with. Both
//! wallet kinds implement it; [`Connection`] is the closed sum over them
//! that the connector stores in its registry.
//!
//! Cache accessors (`address`, `balance` and their setters) never do I/O.
//! Everything async goes to a provider.

use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;

use super::error::WalletError;
use super::extension::ExtensionWallet;
use super::local::LocalWallet;
use super::types::{SentTransaction, TxParams};
use crate::config::{
    EXTENSION_TYPE, EXTENSION_WALLET_NAME, LOCAL_WALLET_NAME, LOCAL_WALLET_TYPE_PREFIX,
    UNKNOWN_WALLET_NAME,
};

#[async_trait]
pub trait Wallet: Send + Sync {
    /// The connection identity. Stable for the wallet's lifetime.
    fn connection_type(&self) -> String;

    fn wallet_name(&self) -> &'static str;

    /// Cached active address, lowercase.
    fn address(&self) -> Option<String>;

    fn set_address(&self, address: Option<String>);

    /// Cached balance. Zero until the first successful poll.
    fn balance(&self) -> BigUint;

    fn set_balance(&self, balance: BigUint);

    /// `true` while no signing capability is available.
    fn is_locked(&self) -> bool;

    /// Whether this connection can work at all in the current host.
    fn is_supported(&self) -> bool {
        true
    }

    /// Accounts the provider currently authorizes. Provider failures are
    /// swallowed and read as "no account".
    async fn accounts(&self) -> Vec<String>;

    /// Fetch the live balance of the active address.
    async fn load_balance(&self) -> Result<BigUint, WalletError>;

    async fn sign_message(&self, message: &str) -> Result<String, WalletError>;

    async fn personal_sign_message(&self, message: &str) -> Result<String, WalletError> {
        self.sign_message(message).await
    }

    async fn send_transaction(&self, params: TxParams) -> Result<SentTransaction, WalletError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletKind {
    Local,
    Extension,
}

/// One entry in the connector's registry.
///
/// Cloning is cheap and shares the wallet: there is exactly one live
/// instance per identity.
#[derive(Clone)]
pub enum Connection {
    Local(Arc<LocalWallet>),
    Extension(Arc<ExtensionWallet>),
}

impl Connection {
    pub fn kind(&self) -> WalletKind {
        match self {
            Self::Local(_) => WalletKind::Local,
            Self::Extension(_) => WalletKind::Extension,
        }
    }

    pub fn as_local(&self) -> Option<&Arc<LocalWallet>> {
        match self {
            Self::Local(w) => Some(w),
            Self::Extension(_) => None,
        }
    }

    pub fn as_extension(&self) -> Option<&Arc<ExtensionWallet>> {
        match self {
            Self::Extension(w) => Some(w),
            Self::Local(_) => None,
        }
    }
}

impl Deref for Connection {
    type Target = dyn Wallet;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Local(w) => w.as_ref(),
            Self::Extension(w) => w.as_ref(),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("type", &self.connection_type())
            .field("address", &self.address())
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Display name for a connection identity.
pub fn wallet_name(connection_type: &str) -> &'static str {
    if connection_type == EXTENSION_TYPE {
        EXTENSION_WALLET_NAME
    } else if connection_type.starts_with(LOCAL_WALLET_TYPE_PREFIX) {
        LOCAL_WALLET_NAME
    } else {
        UNKNOWN_WALLET_NAME
    }
}

pub fn is_local_wallet(connection_type: &str) -> bool {
    wallet_name(connection_type) == LOCAL_WALLET_NAME
}

/// The address embedded in a local wallet identity.
pub fn local_wallet_address(connection_type: &str) -> Option<&str> {
    connection_type.strip_prefix(LOCAL_WALLET_TYPE_PREFIX)
}
