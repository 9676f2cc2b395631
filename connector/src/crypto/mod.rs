//! # Cryptographic Primitives
//!
//! Thin, typed wrappers around audited crates. Nothing in here is clever:
//!
//! - **Ed25519** (ed25519-dalek) for wallet keys and message signatures.
//! - **BLAKE3** to derive addresses from public keys.
//! - **scrypt** to stretch passwords into keys.
//! - **AES-256-GCM** to seal secret keys at rest.

pub mod encryption;
pub mod keys;
pub mod keystore;

pub use encryption::{EncryptionError, KdfParams};
pub use keys::{normalize_address, KeyError, WalletKeypair};
pub use keystore::{parse_record_address, KeystoreError, KeystoreRecord};
