//! # Storage Module
//!
//! The persisted side of the connector: a string key-value contract and the
//! typed views built on top of it.
//!
//! ```text
//! kv.rs        KeyValueStore trait, StoreError, in-memory store
//! db.rs        sled-backed store for native hosts
//! wallets.rs   encrypted wallet record list + last selected identity
//! ```

pub mod db;
pub mod kv;
pub mod wallets;

pub use db::SledStore;
pub use kv::{KeyValueStore, MemoryStore, StoreError, StoreResult};
pub use wallets::WalletStore;
