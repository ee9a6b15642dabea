//! Wallet provider capability.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::identity::{Address, ChainId};
use crate::protocol::{CanonicalMessage, Signature};

/// Errors reported by a wallet provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// No wallet is connected, or the provider is not reachable.
    #[error("wallet provider unavailable")]
    Unavailable,

    /// The user or the provider declined the request.
    #[error("request rejected by the wallet")]
    Rejected,

    /// Any other provider-side failure.
    #[error("wallet provider error: {0}")]
    Other(String),
}

/// Change notifications emitted by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The connected accounts changed (first entry is the visitor).
    AccountsChanged(Vec<Address>),
    /// The context accounts changed (first entry is the owner).
    ContextAccountsChanged(Vec<Address>),
    /// The active chain changed.
    ChainChanged(ChainId),
    /// The provider went away; all identity values are now unknown.
    Disconnected,
}

/// External component that holds the visitor's keys.
///
/// Implementations wrap whatever the host environment offers (a browser
/// extension bridge, a hardware wallet, a local key in tests). The gateway
/// never sees key material, only addresses and signatures.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Accounts the visitor has connected.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// Accounts of the context the visitor is looking at (content owners).
    async fn request_context_accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// The currently selected chain.
    async fn request_chain(&self) -> Result<ChainId, WalletError>;

    /// Produce a `personal_sign` signature over `message` with `signer`'s key.
    ///
    /// May suspend until the user answers a prompt.
    async fn sign(
        &self,
        signer: &Address,
        message: &CanonicalMessage,
    ) -> Result<Signature, WalletError>;

    /// Subscribe to account, context and chain changes.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}
