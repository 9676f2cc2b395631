//! # Extension Wallet
//!
//! Adapter over the wallet the browser injects into the page. There is one
//! instance per connector; authorization via [`enable`](ExtensionWallet::enable)
//! takes the place of unlock, and the wallet counts as locked until an
//! account has been bound.
//!
//! Provider errors are passed through as they come. The only errors this
//! adapter raises itself are the address preconditions.

use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::connection::Wallet;
use super::error::WalletError;
use super::types::{SentTransaction, TxParams};
use crate::config::{EXTENSION_TYPE, EXTENSION_WALLET_NAME};
use crate::provider::BrowserProvider;

#[derive(Default)]
struct ExtensionState {
    address: Option<String>,
    balance: BigUint,
}

pub struct ExtensionWallet {
    provider: Arc<dyn BrowserProvider>,
    state: Mutex<ExtensionState>,
}

impl ExtensionWallet {
    pub fn new(provider: Arc<dyn BrowserProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(ExtensionState::default()),
        }
    }

    /// Ask the provider to authorize this page and bind the first account
    /// it exposes. Returns the bound address, if any.
    pub async fn enable(&self) -> Result<Option<String>, WalletError> {
        let accounts = self.provider.enable().await?;
        let address = accounts.first().map(|a| a.to_lowercase());
        if let Some(address) = &address {
            info!(address = %address, "extension wallet enabled");
        }
        self.set_address(address.clone());
        Ok(address)
    }

    fn bound_address(&self) -> Result<String, WalletError> {
        self.address().ok_or(WalletError::NotFoundAddress)
    }
}

#[async_trait]
impl Wallet for ExtensionWallet {
    fn connection_type(&self) -> String {
        EXTENSION_TYPE.to_string()
    }

    fn wallet_name(&self) -> &'static str {
        EXTENSION_WALLET_NAME
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
        self.state.lock().address.is_none()
    }

    async fn accounts(&self) -> Vec<String> {
        match self.provider.accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                debug!(error = %e, "extension accounts unavailable");
                Vec::new()
            }
        }
    }

    async fn load_balance(&self) -> Result<BigUint, WalletError> {
        let address = self.bound_address()?;
        Ok(self.provider.balance(&address).await?)
    }

    async fn sign_message(&self, message: &str) -> Result<String, WalletError> {
        self.personal_sign_message(message).await
    }

    async fn personal_sign_message(&self, message: &str) -> Result<String, WalletError> {
        let address = self.bound_address()?;
        Ok(self.provider.personal_sign(message, &address).await?)
    }

    async fn send_transaction(&self, mut params: TxParams) -> Result<SentTransaction, WalletError> {
        let address = self.bound_address()?;
        params.from.get_or_insert(address);
        let hash = self.provider.send_transaction(&params).await?;
        Ok(SentTransaction::Hash(hash))
    }
}
