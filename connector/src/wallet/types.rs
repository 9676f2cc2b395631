//! Transaction shapes shared by both wallet kinds.

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::crypto::keys::WalletKeypair;

/// What a caller asks a wallet to send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxParams {
    /// Sender. Filled in from the wallet's address when absent.
    pub from: Option<String>,
    pub to: String,
    /// Hex call data.
    pub data: Option<String>,
    pub value: Option<BigUint>,
    pub gas_price: Option<u64>,
    pub gas_limit: Option<u64>,
}

impl TxParams {
    pub fn transfer(to: &str, value: BigUint) -> Self {
        Self {
            to: to.to_string(),
            value: Some(value),
            ..Self::default()
        }
    }
}

/// Fields covered by the sender's signature.
#[derive(Serialize)]
struct SigningPayload<'a> {
    from: &'a str,
    to: &'a str,
    data: &'a str,
    value: &'a BigUint,
    gas_price: Option<u64>,
    gas_limit: Option<u64>,
    timestamp_ms: i64,
}

/// A transaction signed by a local wallet, ready for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub from: String,
    pub to: String,
    pub data: String,
    pub value: BigUint,
    pub gas_price: Option<u64>,
    pub gas_limit: Option<u64>,
    pub timestamp_ms: i64,
    /// `0x` BLAKE3 digest of the signing payload.
    pub hash: String,
    /// Hex public key of the signer, so nodes can verify without a lookup.
    pub public_key: String,
    /// `0x` Ed25519 signature over the digest bytes.
    pub signature: String,
}

impl SignedTransaction {
    /// Sign `params` as `keypair`. `params.from` is ignored; the sender is
    /// always the key pair's own address.
    pub fn sign(params: &TxParams, keypair: &WalletKeypair) -> Self {
        let from = keypair.address();
        let to = params.to.to_lowercase();
        let data = params.data.clone().unwrap_or_default();
        let value = params.value.clone().unwrap_or_default();
        let timestamp_ms = Utc::now().timestamp_millis();

        let payload = SigningPayload {
            from: &from,
            to: &to,
            data: &data,
            value: &value,
            gas_price: params.gas_price,
            gas_limit: params.gas_limit,
            timestamp_ms,
        };
        // Serializing a struct of strings and integers can't fail.
        let encoded = serde_json::to_vec(&payload).unwrap_or_default();
        let digest = blake3::hash(&encoded);

        Self {
            from,
            to,
            data,
            value,
            gas_price: params.gas_price,
            gas_limit: params.gas_limit,
            timestamp_ms,
            hash: format!("0x{}", digest.to_hex()),
            public_key: hex::encode(keypair.public_key_bytes()),
            signature: keypair.sign_hex(digest.as_bytes()),
        }
    }
}

/// What a local wallet returns after a node accepted its transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: BigUint,
    pub submitted_at: DateTime<Utc>,
}

/// Result of `send_transaction`. The extension only ever hands back a
/// hash; local wallets know enough to return the full response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentTransaction {
    Hash(String),
    Response(TransactionResponse),
}

impl SentTransaction {
    pub fn hash(&self) -> &str {
        match self {
            Self::Hash(h) => h,
            Self::Response(r) => &r.hash,
        }
    }
}
