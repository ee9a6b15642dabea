//! Live view of the visitor, owner and chain reported by a wallet provider.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{ClientErrorKind, GateError, GateResult};
use crate::wallet::{ProviderEvent, WalletProvider};

use super::{Address, ChainId};

/// Identity values at one instant. Any field may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentitySnapshot {
    pub visitor: Option<Address>,
    pub owner: Option<Address>,
    pub chain: Option<ChainId>,
}

impl IdentitySnapshot {
    /// The visitor, or `IdentityUnavailable`.
    pub fn require_visitor(&self) -> GateResult<Address> {
        self.visitor.ok_or_else(|| unavailable("visitor account"))
    }

    /// The owner, or `IdentityUnavailable`.
    pub fn require_owner(&self) -> GateResult<Address> {
        self.owner.ok_or_else(|| unavailable("context owner"))
    }

    /// The chain, or `IdentityUnavailable`.
    pub fn require_chain(&self) -> GateResult<ChainId> {
        self.chain.ok_or_else(|| unavailable("chain id"))
    }
}

fn unavailable(missing: &'static str) -> GateError {
    GateError::Client {
        kind: ClientErrorKind::IdentityUnavailable { missing },
    }
}

/// Tracks provider identity in the background.
///
/// Reads never block and always return the latest known value. Bursts of
/// provider events collapse into whatever the last one said.
pub struct IdentitySource {
    state: watch::Receiver<IdentitySnapshot>,
    task: JoinHandle<()>,
}

impl IdentitySource {
    /// Read the provider's current identity and start following its events.
    pub async fn connect(provider: Arc<dyn WalletProvider>) -> Self {
        // Subscribe before the first read so no change slips between the two.
        let events = provider.subscribe();
        let initial = fetch_snapshot(provider.as_ref()).await;
        let (tx, state) = watch::channel(initial);

        let task = tokio::spawn(follow_events(provider, events, tx));
        Self { state, task }
    }

    pub fn current_visitor(&self) -> Option<Address> {
        self.state.borrow().visitor
    }

    pub fn current_owner(&self) -> Option<Address> {
        self.state.borrow().owner
    }

    pub fn current_chain(&self) -> Option<ChainId> {
        self.state.borrow().chain
    }

    /// All three values, read together.
    pub fn snapshot(&self) -> IdentitySnapshot {
        *self.state.borrow()
    }

    /// Receiver notified on every identity change.
    pub fn subscribe(&self) -> watch::Receiver<IdentitySnapshot> {
        self.state.clone()
    }
}

impl Drop for IdentitySource {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn fetch_snapshot(provider: &dyn WalletProvider) -> IdentitySnapshot {
    let accounts = provider.request_accounts().await;
    let context = provider.request_context_accounts().await;
    let chain = provider.request_chain().await;

    match (accounts, context, chain) {
        (Ok(accounts), Ok(context), Ok(chain)) => IdentitySnapshot {
            visitor: accounts.first().copied(),
            owner: context.first().copied(),
            chain: Some(chain),
        },
        (accounts, context, chain) => {
            let err = [accounts.err(), context.err(), chain.err()]
                .into_iter()
                .flatten()
                .next();
            debug!(error = ?err, "Wallet provider unavailable, identity cleared");
            IdentitySnapshot::default()
        }
    }
}

async fn follow_events(
    provider: Arc<dyn WalletProvider>,
    mut events: tokio::sync::broadcast::Receiver<ProviderEvent>,
    tx: watch::Sender<IdentitySnapshot>,
) {
    let mut disconnected = tx.borrow().chain.is_none();

    loop {
        match events.recv().await {
            Ok(ProviderEvent::Disconnected) => {
                disconnected = true;
                tx.send_replace(IdentitySnapshot::default());
            }
            Ok(_) if disconnected => {
                // Reconnection: the event only tells part of the story.
                let snapshot = fetch_snapshot(provider.as_ref()).await;
                disconnected = snapshot.chain.is_none();
                tx.send_replace(snapshot);
            }
            Ok(ProviderEvent::AccountsChanged(accounts)) => {
                tx.send_modify(|s| s.visitor = accounts.first().copied());
            }
            Ok(ProviderEvent::ContextAccountsChanged(accounts)) => {
                tx.send_modify(|s| s.owner = accounts.first().copied());
            }
            Ok(ProviderEvent::ChainChanged(chain)) => {
                tx.send_modify(|s| s.chain = Some(chain));
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed wallet events, refreshing identity");
                let snapshot = fetch_snapshot(provider.as_ref()).await;
                disconnected = snapshot.chain.is_none();
                tx.send_replace(snapshot);
            }
            Err(RecvError::Closed) => {
                debug!("Wallet provider event stream closed");
                tx.send_replace(IdentitySnapshot::default());
                return;
            }
        }
    }
}
