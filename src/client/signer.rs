//! Single-flight signature requests against a wallet provider.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use crate::error::{ClientErrorKind, GateError, GateResult};
use crate::identity::Address;
use crate::protocol::{CanonicalMessage, Signature};
use crate::wallet::{WalletError, WalletProvider};

/// Default time a user gets to answer a signature prompt.
pub const DEFAULT_SIGN_TIMEOUT: Duration = Duration::from_secs(120);

/// Asks the wallet provider for signatures, one at a time.
///
/// A second request while one is pending fails with `ChallengeInFlight`
/// rather than queueing a second prompt. Dropping the returned future or
/// calling [`Signer::cancel`] abandons the pending request.
pub struct Signer {
    provider: Arc<dyn WalletProvider>,
    timeout: Duration,
    in_flight: Mutex<()>,
    cancel: Notify,
}

impl Signer {
    pub fn new(provider: Arc<dyn WalletProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            in_flight: Mutex::new(()),
            cancel: Notify::new(),
        }
    }

    /// Sign `message` with `visitor`'s key.
    pub async fn sign(&self, visitor: &Address, message: &CanonicalMessage) -> GateResult<Signature> {
        let _guard = self.in_flight.try_lock().map_err(|_| client(ClientErrorKind::ChallengeInFlight))?;

        debug!(visitor = %visitor, "Requesting signature");
        let request = tokio::time::timeout(self.timeout, self.provider.sign(visitor, message));

        tokio::select! {
            result = request => match result {
                Ok(Ok(signature)) => Ok(signature),
                Ok(Err(err)) => Err(map_wallet_error(err)),
                Err(_) => Err(client(ClientErrorKind::SignerTimeout {
                    timeout_secs: self.timeout.as_secs(),
                })),
            },
            _ = self.cancel.notified() => {
                info!(visitor = %visitor, "Signature request canceled");
                Err(client(ClientErrorKind::SignCanceled))
            }
        }
    }

    /// Abandon the pending request, if any.
    pub fn cancel(&self) {
        self.cancel.notify_waiters();
    }

    /// Whether a request is currently awaiting the provider.
    pub fn is_pending(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }
}

fn client(kind: ClientErrorKind) -> GateError {
    GateError::Client { kind }
}

fn map_wallet_error(err: WalletError) -> GateError {
    let kind = match err {
        WalletError::Unavailable => ClientErrorKind::SignerUnavailable,
        WalletError::Rejected => ClientErrorKind::SignatureRejected,
        WalletError::Other(message) => ClientErrorKind::Provider { message },
    };
    client(kind)
}
