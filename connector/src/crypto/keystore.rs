//! # Encrypted Keystore Records
//!
//! The at-rest form of a local wallet. Each record is a self-describing JSON
//! document carrying the cleartext address (so records can be matched and
//! listed without the password), the scrypt salt and cost, and the sealed
//! secret key.
//!
//! ```text
//! {
//!   "version": 3,
//!   "id": "5f0c...",
//!   "address": "0x3f1e...",
//!   "created_at": "2026-01-01T00:00:00Z",
//!   "crypto": {
//!     "cipher": "aes-256-gcm",
//!     "ciphertext": "<hex nonce || ciphertext || tag>",
//!     "kdf": "scrypt",
//!     "kdfparams": { "log_n": 14, "r": 8, "p": 1, "salt": "<hex>" }
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::encryption::{self, EncryptionError, KdfParams};
use super::keys::{normalize_address, KeyError, WalletKeypair};
use crate::config::{KDF_SALT_LENGTH, KEYSTORE_VERSION};

const CIPHER_NAME: &str = "aes-256-gcm";
const KDF_NAME: &str = "scrypt";

/// Errors from building or opening a keystore record.
#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("malformed keystore record: {0}")]
    Malformed(String),

    #[error("decrypted key does not match record address {0}")]
    AddressMismatch(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
    /// Hex-encoded salt.
    pub salt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoSection {
    pub cipher: String,
    /// Hex of `nonce || ciphertext || tag`.
    pub ciphertext: String,
    pub kdf: String,
    pub kdfparams: ScryptParams,
}

/// One encrypted wallet, as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoreRecord {
    pub version: u32,
    pub id: Uuid,
    /// Lowercase `0x` address of the sealed key.
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub crypto: CryptoSection,
}

impl KeystoreRecord {
    /// Seal `keypair` under `password`.
    pub fn encrypt(
        keypair: &WalletKeypair,
        password: &str,
        params: &KdfParams,
    ) -> Result<Self, KeystoreError> {
        let mut salt = [0u8; KDF_SALT_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut salt);

        let key = encryption::derive_key(password, &salt, params)?;
        let sealed = encryption::seal(&key, &keypair.secret_key_bytes())?;

        Ok(Self {
            version: KEYSTORE_VERSION,
            id: Uuid::new_v4(),
            address: keypair.address(),
            created_at: Utc::now(),
            crypto: CryptoSection {
                cipher: CIPHER_NAME.to_string(),
                ciphertext: hex::encode(sealed),
                kdf: KDF_NAME.to_string(),
                kdfparams: ScryptParams {
                    log_n: params.log_n,
                    r: params.r,
                    p: params.p,
                    salt: hex::encode(salt),
                },
            },
        })
    }

    /// Open the record with `password`.
    ///
    /// A wrong password surfaces as [`EncryptionError::DecryptFailed`]. The
    /// recovered key is re-checked against the stored address, so a record
    /// whose address field was edited by hand never unlocks.
    pub fn decrypt(&self, password: &str) -> Result<WalletKeypair, KeystoreError> {
        if self.crypto.cipher != CIPHER_NAME || self.crypto.kdf != KDF_NAME {
            return Err(KeystoreError::Malformed(format!(
                "unsupported cipher/kdf {}/{}",
                self.crypto.cipher, self.crypto.kdf
            )));
        }
        let kdf = &self.crypto.kdfparams;
        let salt = hex::decode(&kdf.salt)
            .map_err(|e| KeystoreError::Malformed(format!("salt: {e}")))?;
        let sealed = hex::decode(&self.crypto.ciphertext)
            .map_err(|e| KeystoreError::Malformed(format!("ciphertext: {e}")))?;

        let params = KdfParams {
            log_n: kdf.log_n,
            r: kdf.r,
            p: kdf.p,
        };
        let key = encryption::derive_key(password, &salt, &params)?;
        let secret = encryption::open(&key, &sealed)?;

        let secret: [u8; 32] = secret
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        let keypair = WalletKeypair::from_secret_key_bytes(&secret);

        if keypair.address() != self.address.to_lowercase() {
            return Err(KeystoreError::AddressMismatch(self.address.clone()));
        }
        Ok(keypair)
    }

    pub fn to_json(&self) -> Result<String, KeystoreError> {
        serde_json::to_string(self).map_err(|e| KeystoreError::Malformed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, KeystoreError> {
        serde_json::from_str(json).map_err(|e| KeystoreError::Malformed(e.to_string()))
    }
}

/// Pull the lowercase address out of a serialized record without decrypting.
pub fn parse_record_address(json: &str) -> Result<String, KeystoreError> {
    #[derive(Deserialize)]
    struct AddressOnly {
        address: String,
    }
    let parsed: AddressOnly =
        serde_json::from_str(json).map_err(|e| KeystoreError::Malformed(e.to_string()))?;
    Ok(normalize_address(&parsed.address)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_opens_with_right_password() {
        let kp = WalletKeypair::generate();
        let record = KeystoreRecord::encrypt(&kp, "pw1", &KdfParams::fast()).unwrap();
        assert_eq!(record.address, kp.address());

        let restored = record.decrypt("pw1").unwrap();
        assert_eq!(restored.address(), kp.address());
    }

    #[test]
    fn record_rejects_wrong_password() {
        let kp = WalletKeypair::generate();
        let record = KeystoreRecord::encrypt(&kp, "pw1", &KdfParams::fast()).unwrap();
        assert!(matches!(
            record.decrypt("nope"),
            Err(KeystoreError::Encryption(EncryptionError::DecryptFailed))
        ));
    }

    #[test]
    fn json_carries_address_in_clear() {
        let kp = WalletKeypair::generate();
        let record = KeystoreRecord::encrypt(&kp, "pw", &KdfParams::fast()).unwrap();
        let json = record.to_json().unwrap();
        assert_eq!(parse_record_address(&json).unwrap(), kp.address());
        assert!(!json.contains(&hex::encode(kp.secret_key_bytes())));
    }

    #[test]
    fn tampered_address_never_unlocks() {
        let kp = WalletKeypair::generate();
        let mut record = KeystoreRecord::encrypt(&kp, "pw", &KdfParams::fast()).unwrap();
        record.address = WalletKeypair::generate().address();
        assert!(matches!(
            record.decrypt("pw"),
            Err(KeystoreError::AddressMismatch(_))
        ));
    }

    #[test]
    fn garbage_json_is_malformed() {
        assert!(matches!(
            parse_record_address("{not json"),
            Err(KeystoreError::Malformed(_))
        ));
    }
}
