//! In-process wallet backed by local secp256k1 keys.
//!
//! Used by tests and by embedders that sign with a key they hold
//! themselves. Test keys are derived from small integer seeds so fixtures
//! are reproducible.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::broadcast;
use tracing::debug;

use crate::identity::{Address, ChainId};
use crate::protocol::{CanonicalMessage, Signature, SIGNATURE_LENGTH};

use super::{ProviderEvent, WalletError, WalletProvider};

/// Capacity of the event channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

struct WalletState {
    accounts: Vec<SigningKey>,
    context: Vec<Address>,
    chain: ChainId,
    connected: bool,
    rejecting: bool,
    sign_delay: Option<Duration>,
}

/// A [`WalletProvider`] holding its keys in memory.
pub struct LocalKeyWallet {
    state: Mutex<WalletState>,
    events: broadcast::Sender<ProviderEvent>,
}

impl LocalKeyWallet {
    /// Create a connected wallet with a single account.
    pub fn new(key: SigningKey, chain: ChainId) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(WalletState {
                accounts: vec![key],
                context: Vec::new(),
                chain,
                connected: true,
                rejecting: false,
                sign_delay: None,
            }),
            events,
        }
    }

    /// Deterministic key for `seed`.
    pub fn key_from_seed(seed: u64) -> SigningKey {
        SigningKey::random(&mut StdRng::seed_from_u64(seed))
    }

    /// Address controlled by `key`.
    pub fn address_of(key: &SigningKey) -> Address {
        Address::from_verifying_key(key.verifying_key())
    }

    /// Produce a `personal_sign` signature with `key`, `v` in the 27/28 form.
    pub fn sign_with(key: &SigningKey, message: &CanonicalMessage) -> Result<Signature, WalletError> {
        let digest = message.personal_sign_hash();
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| WalletError::Other(e.to_string()))?;

        let mut bytes = [0u8; SIGNATURE_LENGTH];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = 27 + recovery_id.to_byte();
        Ok(Signature::from_bytes(bytes))
    }

    /// Set the context accounts (first entry is the owner).
    pub fn set_context(&self, owners: Vec<Address>) {
        self.with_state(|state| state.context = owners.clone());
        self.emit(ProviderEvent::ContextAccountsChanged(owners));
    }

    /// Switch the active chain.
    pub fn set_chain(&self, chain: ChainId) {
        self.with_state(|state| state.chain = chain);
        self.emit(ProviderEvent::ChainChanged(chain));
    }

    /// Make `key` the active account.
    pub fn switch_account(&self, key: SigningKey) {
        let address = Self::address_of(&key);
        self.with_state(|state| {
            state.accounts.retain(|k| Self::address_of(k) != address);
            state.accounts.insert(0, key);
            state.connected = true;
        });
        self.emit(ProviderEvent::AccountsChanged(self.addresses()));
    }

    /// Disconnect the wallet.
    pub fn disconnect(&self) {
        self.with_state(|state| state.connected = false);
        self.emit(ProviderEvent::Disconnected);
    }

    /// Reject every signature request while set.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.with_state(|state| state.rejecting = rejecting);
    }

    /// Hold every signature request for `delay` before answering.
    pub fn set_sign_delay(&self, delay: Option<Duration>) {
        self.with_state(|state| state.sign_delay = delay);
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut WalletState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    fn addresses(&self) -> Vec<Address> {
        self.with_state(|state| state.accounts.iter().map(Self::address_of).collect())
    }

    fn emit(&self, event: ProviderEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletProvider for LocalKeyWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        if !self.with_state(|state| state.connected) {
            return Err(WalletError::Unavailable);
        }
        Ok(self.addresses())
    }

    async fn request_context_accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.with_state(|state| {
            if state.connected {
                Ok(state.context.clone())
            } else {
                Err(WalletError::Unavailable)
            }
        })
    }

    async fn request_chain(&self) -> Result<ChainId, WalletError> {
        self.with_state(|state| {
            if state.connected {
                Ok(state.chain)
            } else {
                Err(WalletError::Unavailable)
            }
        })
    }

    async fn sign(
        &self,
        signer: &Address,
        message: &CanonicalMessage,
    ) -> Result<Signature, WalletError> {
        let (key, rejecting, delay) = self.with_state(|state| {
            if !state.connected {
                return Err(WalletError::Unavailable);
            }
            let key = state
                .accounts
                .iter()
                .find(|k| Self::address_of(k) == *signer)
                .cloned()
                .ok_or(WalletError::Unavailable)?;
            Ok((key, state.rejecting, state.sign_delay))
        })?;

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if rejecting {
            debug!(signer = %signer, "Signature request rejected");
            return Err(WalletError::Rejected);
        }

        Self::sign_with(&key, message)
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
