//! # Provider Contracts
//!
//! The connector never talks to a chain or a browser directly. Everything
//! outside the process comes in through the traits in this module:
//!
//! - [`NodeProvider`]: the RPC node local wallets read balances from and
//!   broadcast signed transactions to.
//! - [`BrowserProvider`]: the wallet the browser injects into the page.
//! - [`DocumentVisibility`]: whether the hosting document is on screen,
//!   which decides how eagerly balances are polled.
//!
//! Every provider call is a suspension point. Implementations must not
//! block the calling task.

use async_trait::async_trait;
use num_bigint::BigUint;
use thiserror::Error;

use crate::wallet::types::{SignedTransaction, TxParams};

/// Errors raised by providers. The connector passes these through
/// untouched; it only classifies its own wallet errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider is not connected")]
    NotConnected,

    #[error("request rejected by the user")]
    Rejected,

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

/// An RPC node reachable from a local wallet.
#[async_trait]
pub trait NodeProvider: Send + Sync {
    /// Human-readable endpoint, for logs.
    fn endpoint(&self) -> String;

    async fn get_balance(&self, address: &str) -> Result<BigUint, ProviderError>;

    /// Broadcast a signed transaction and return its hash.
    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<String, ProviderError>;
}

/// A browser-injected wallet.
#[async_trait]
pub trait BrowserProvider: Send + Sync {
    /// Ask the user to authorize this page. Resolves with the exposed
    /// accounts, first one active.
    async fn enable(&self) -> Result<Vec<String>, ProviderError>;

    /// Accounts currently exposed to the page, without prompting.
    async fn accounts(&self) -> Result<Vec<String>, ProviderError>;

    async fn balance(&self, address: &str) -> Result<BigUint, ProviderError>;

    async fn send_transaction(&self, params: &TxParams) -> Result<String, ProviderError>;

    async fn personal_sign(&self, message: &str, address: &str) -> Result<String, ProviderError>;
}

/// Visibility of the hosting document.
pub trait DocumentVisibility: Send + Sync {
    fn is_visible(&self) -> bool;
}

/// For hosts with no notion of a hidden document (CLIs, daemons).
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysVisible;

impl DocumentVisibility for AlwaysVisible {
    fn is_visible(&self) -> bool {
        true
    }
}

/// Placeholder node used until an endpoint is configured. Every call fails
/// with [`ProviderError::NotConnected`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Disconnected;

#[async_trait]
impl NodeProvider for Disconnected {
    fn endpoint(&self) -> String {
        "disconnected".to_string()
    }

    async fn get_balance(&self, _address: &str) -> Result<BigUint, ProviderError> {
        Err(ProviderError::NotConnected)
    }

    async fn send_transaction(&self, _tx: &SignedTransaction) -> Result<String, ProviderError> {
        Err(ProviderError::NotConnected)
    }
}
