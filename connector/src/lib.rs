// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Wallet Connector
//!
//! Keeps track of every wallet a page can pay with, which one is active,
//! and what its address and balance are right now.
//!
//! Two kinds of wallet sit behind one capability contract
//! ([`wallet::Wallet`]):
//!
//! - **Local wallets**: Ed25519 keys encrypted at rest (scrypt +
//!   AES-256-GCM) that must be unlocked with a password and lock
//!   themselves again after fifteen quiet minutes.
//! - **The extension wallet**: whatever the browser injected. Authorization
//!   replaces unlock.
//!
//! The [`Connector`] owns the registry of connections, the selection, one
//! account loop and one balance loop per connection, and a registry of
//! change callbacks. Balance polling is adaptive: the selected connection
//! in a visible document is polled every few seconds, everything else a
//! hundred times less often.
//!
//! ## Modules
//!
//! - **config**: cadences, store keys, identity prefixes, crypto sizes.
//! - **crypto**: key pairs, addresses and the encrypted keystore record.
//! - **storage**: the key-value contract plus in-memory and sled stores.
//! - **provider**: traits for the node, the browser wallet and visibility.
//! - **wallet**: the contract, both wallet kinds and the local registry.
//! - **connector**: selection, watchers and notification.
//! - **testing**: scriptable providers for tests and embedding.
//!
//! Nothing here blocks on I/O outside a provider call, and no secret key
//! ever reaches a log line.

pub mod config;
pub mod connector;
pub mod crypto;
pub mod provider;
pub mod storage;
pub mod testing;
pub mod wallet;

pub use config::ConnectorConfig;
pub use connector::{Connector, ConnectorBuilder, ConnectorError, WatcherFailure};
pub use wallet::{Connection, Wallet, WalletError, WalletKind};
