//! # Key Management
//!
//! Ed25519 key pairs for local wallets, and the address derived from them.
//!
//! An address is `0x` followed by the lowercase hex of the last
//! [`ADDRESS_LENGTH`] bytes of BLAKE3(public key). Addresses are always
//! handled in lowercase inside the connector; [`normalize_address`] is the
//! single place mixed-case input gets folded.
//!
//! Key bytes are never logged. `Debug` prints the address and nothing else.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

use crate::config::ADDRESS_LENGTH;

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not hex")]
    InvalidSecretKey,

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// The signing key behind a local wallet.
///
/// Not `Serialize`: the only way key material leaves this type
/// is [`secret_key_bytes`](Self::secret_key_bytes), which the keystore
/// encrypts immediately.
pub struct WalletKeypair {
    signing_key: SigningKey,
}

impl WalletKeypair {
    /// Generate a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild a key pair from its 32-byte secret.
    pub fn from_secret_key_bytes(bytes: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Parse a hex secret key, with or without a `0x` prefix.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let trimmed = hex_str.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(trimmed).map_err(|_| KeyError::InvalidSecretKey)?;
        let arr: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_secret_key_bytes(&arr))
    }

    /// Raw secret key bytes. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The lowercase `0x` address of this key pair.
    pub fn address(&self) -> String {
        address_from_public_key(&self.public_key_bytes())
    }

    /// Sign `message` and return the signature as `0x`-prefixed hex.
    pub fn sign_hex(&self, message: &[u8]) -> String {
        let sig = self.signing_key.sign(message);
        format!("0x{}", hex::encode(sig.to_bytes()))
    }
}

impl Clone for WalletKeypair {
    fn clone(&self) -> Self {
        Self::from_secret_key_bytes(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for WalletKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletKeypair(address={})", self.address())
    }
}

/// Derive the wallet address for an Ed25519 public key.
pub fn address_from_public_key(public_key: &[u8; 32]) -> String {
    let digest = blake3::hash(public_key);
    let bytes = digest.as_bytes();
    format!("0x{}", hex::encode(&bytes[32 - ADDRESS_LENGTH..]))
}

/// Validate an address and fold it to lowercase.
pub fn normalize_address(address: &str) -> Result<String, KeyError> {
    let lower = address.trim().to_lowercase();
    let body = lower
        .strip_prefix("0x")
        .ok_or_else(|| KeyError::InvalidAddress(address.to_string()))?;
    if body.len() != ADDRESS_LENGTH * 2 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(KeyError::InvalidAddress(address.to_string()));
    }
    Ok(lower)
}

/// Check a `0x`-hex signature against a raw public key.
///
/// Returns `false` for malformed input rather than erroring; callers only
/// ever want a yes/no answer.
pub fn verify_hex(public_key: &[u8; 32], message: &[u8], signature_hex: &str) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let body = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let Ok(bytes) = hex::decode(body) else {
        return false;
    };
    let Ok(arr) = <[u8; 64]>::try_from(bytes.as_slice()) else {
        return false;
    };
    verifying_key
        .verify(message, &DalekSignature::from_bytes(&arr))
        .is_ok()
}
