//! Wallet provider abstraction.
//!
//! The client side never holds key material directly; it asks a
//! [`WalletProvider`] for accounts, the active chain, and signatures.

mod local;
mod provider;

pub use local::LocalKeyWallet;
pub use provider::{ProviderEvent, WalletError, WalletProvider};
