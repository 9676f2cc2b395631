//! Error taxonomy shared by every wallet kind.

use thiserror::Error;

use crate::crypto::keys::KeyError;
use crate::crypto::keystore::KeystoreError;
use crate::provider::ProviderError;
use crate::storage::StoreError;

/// Errors surfaced by the wallet capability contract.
///
/// Three kinds are *expected* during normal polling and are recoverable by
/// prompting the user ([`is_benign`](Self::is_benign)). Everything else is a
/// real failure.
#[derive(Debug, Error)]
pub enum WalletError {
    /// A local wallet operation needs the signing key, and the wallet is
    /// locked. Prompt for the password.
    #[error("wallet is locked; unlock it first")]
    NeedUnlockWallet,

    /// No active address is bound (extension not enabled yet).
    #[error("no address bound to this connection")]
    NotFoundAddress,

    /// The connection can't perform this operation at all (no provider).
    #[error("operation not supported by this connection")]
    NotSupported,

    /// Unlock was requested for an address that was never saved.
    #[error("no saved wallet for address {address}")]
    WalletNotFound { address: String },

    /// The saved record didn't open: wrong password or a corrupt record.
    #[error("failed to decrypt wallet: {0}")]
    Decrypt(#[source] KeystoreError),

    #[error("keystore error: {0}")]
    Keystore(#[from] KeystoreError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Passed through from the node or browser provider untouched.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// The blocking key-derivation task panicked or was cancelled.
    #[error("key derivation task failed: {0}")]
    KdfTask(#[from] tokio::task::JoinError),
}

impl WalletError {
    /// `true` for the errors a watcher expects while a connection is locked
    /// or not yet enabled.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::NeedUnlockWallet | Self::NotFoundAddress | Self::NotSupported
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_precondition_errors_are_benign() {
        assert!(WalletError::NeedUnlockWallet.is_benign());
        assert!(WalletError::NotFoundAddress.is_benign());
        assert!(WalletError::NotSupported.is_benign());
        assert!(!WalletError::Provider(ProviderError::NotConnected).is_benign());
        assert!(!WalletError::WalletNotFound {
            address: "0x1".into()
        }
        .is_benign());
    }
}
