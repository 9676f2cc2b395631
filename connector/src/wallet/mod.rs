//! # Wallets
//!
//! The capability contract ([`Wallet`]), its two implementations and the
//! registry that owns local wallet instances.

pub mod connection;
pub mod error;
pub mod extension;
pub mod local;
pub mod registry;
pub mod types;

pub use connection::{
    is_local_wallet, local_wallet_address, wallet_name, Connection, Wallet,
    WalletKind,
};
pub use error::WalletError;
pub use extension::ExtensionWallet;
pub use local::LocalWallet;
pub use registry::LocalWalletRegistry;
pub use types::{SentTransaction, SignedTransaction, TransactionResponse, TxParams};
