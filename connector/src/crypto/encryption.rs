//! # Password-Based Encryption
//!
//! Local wallet secrets are sealed with AES-256-GCM under a key stretched
//! from the user's password with scrypt. The salt and scrypt cost travel
//! with every record (see [`keystore`](super::keystore)), so records written
//! with one cost setting still open after the default changes.
//!
//! ## Wire format
//!
//! [`seal`] returns `nonce || ciphertext`, the first 12 bytes being a random
//! nonce and the rest ciphertext plus the 16-byte GCM tag. [`open`] expects
//! the same layout.
//!
//! A wrong password and a corrupted record are indistinguishable here. Both
//! surface as [`EncryptionError::DecryptFailed`].

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH, SCRYPT_LOG_N, SCRYPT_P, SCRYPT_R};

/// Errors that can occur during key derivation or (de)cryption.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong password or corrupted record")]
    DecryptFailed,

    #[error("invalid scrypt parameters")]
    InvalidKdfParams,

    #[error("sealed data too short: must be at least {AES_NONCE_LENGTH} bytes")]
    CiphertextTooShort,
}

/// scrypt cost parameters. `log_n` is log2 of the CPU/memory cost N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl KdfParams {
    /// Cheap parameters for tests. Never ship these.
    pub fn fast() -> Self {
        Self {
            log_n: 4,
            r: 1,
            p: 1,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            log_n: SCRYPT_LOG_N,
            r: SCRYPT_R,
            p: SCRYPT_P,
        }
    }
}

/// Stretch `password` into an AES-256 key.
pub fn derive_key(
    password: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<[u8; AES_KEY_LENGTH], EncryptionError> {
    let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, AES_KEY_LENGTH)
        .map_err(|_| EncryptionError::InvalidKdfParams)?;
    let mut key = [0u8; AES_KEY_LENGTH];
    scrypt::scrypt(password.as_bytes(), salt, &scrypt_params, &mut key)
        .map_err(|_| EncryptionError::InvalidKdfParams)?;
    Ok(key)
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn seal(key: &[u8; AES_KEY_LENGTH], plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| EncryptionError::EncryptFailed)?;

    let mut out = Vec::with_capacity(AES_NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt data produced by [`seal`].
pub fn open(key: &[u8; AES_KEY_LENGTH], sealed: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if sealed.len() < AES_NONCE_LENGTH {
        return Err(EncryptionError::CiphertextTooShort);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(AES_NONCE_LENGTH);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::DecryptFailed)?;
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| EncryptionError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_key_depends_on_password_and_salt() {
        let params = KdfParams::fast();
        let a = derive_key("pw1", b"salt-a", &params).unwrap();
        let b = derive_key("pw2", b"salt-a", &params).unwrap();
        let c = derive_key("pw1", b"salt-b", &params).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, derive_key("pw1", b"salt-a", &params).unwrap());
    }

    #[test]
    fn seal_then_open() {
        let key = derive_key("pw", b"salt", &KdfParams::fast()).unwrap();
        let sealed = seal(&key, b"secret key bytes").unwrap();
        assert_eq!(open(&key, &sealed).unwrap(), b"secret key bytes");
    }

    #[test]
    fn wrong_key_fails() {
        let params = KdfParams::fast();
        let key = derive_key("right", b"salt", &params).unwrap();
        let wrong = derive_key("wrong", b"salt", &params).unwrap();
        let sealed = seal(&key, b"secret").unwrap();
        assert!(matches!(
            open(&wrong, &sealed),
            Err(EncryptionError::DecryptFailed)
        ));
    }

    #[test]
    fn truncated_data_rejected() {
        let key = [7u8; AES_KEY_LENGTH];
        assert!(matches!(
            open(&key, &[0u8; 4]),
            Err(EncryptionError::CiphertextTooShort)
        ));
    }

    #[test]
    fn bad_kdf_params_rejected() {
        let params = KdfParams {
            log_n: 70,
            r: 1,
            p: 1,
        };
        assert!(derive_key("pw", b"salt", &params).is_err());
    }
}
