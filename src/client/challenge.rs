//! Builds and signs content requests on behalf of the visitor.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::GateResult;
use crate::identity::{Address, IdentitySource};
use crate::protocol::{AuthHeaders, CanonicalMessage, ChallengeBuilder, Nonce};
use crate::validation::{validate_area, Area, FileName};
use crate::wallet::WalletProvider;

use super::Signer;

/// A signed claim for one (owner, area), ready to attach to a request.
///
/// Each challenge carries a fresh nonce and is good for exactly one request.
#[derive(Debug, Clone)]
pub struct SignedChallenge {
    pub owner: Address,
    pub area: Area,
    pub message: CanonicalMessage,
    pub headers: AuthHeaders,
}

impl SignedChallenge {
    /// Path of the listing endpoint for this challenge's scope.
    pub fn list_path(&self) -> String {
        format!("/api/content/list/{}/{}", self.owner, self.area)
    }

    /// Path of the fetch endpoint for `file_name` in this challenge's scope.
    pub fn fetch_path(&self, file_name: &FileName) -> String {
        format!(
            "/api/content/fetch/{}/{}/{}",
            self.owner,
            self.area,
            urlencoding::encode(file_name.as_str())
        )
    }
}

/// Visitor-side entry point: identity in, signed headers out.
pub struct ChallengeClient {
    identity: IdentitySource,
    signer: Signer,
}

impl ChallengeClient {
    pub fn new(identity: IdentitySource, signer: Signer) -> Self {
        Self { identity, signer }
    }

    /// Follow `provider` and sign through it with `sign_timeout`.
    pub async fn connect(provider: Arc<dyn WalletProvider>, sign_timeout: Duration) -> Self {
        let identity = IdentitySource::connect(Arc::clone(&provider)).await;
        Self::new(identity, Signer::new(provider, sign_timeout))
    }

    pub fn identity(&self) -> &IdentitySource {
        &self.identity
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Sign a claim for `area` of the current owner.
    ///
    /// Identity is read once up front, so a provider change mid-prompt cannot
    /// mix values from two different states into one message.
    pub async fn challenge(&self, area: &str) -> GateResult<SignedChallenge> {
        let snapshot = self.identity.snapshot();
        let visitor = snapshot.require_visitor()?;
        let owner = snapshot.require_owner()?;
        let chain_id = snapshot.require_chain()?;
        let area = validate_area(area)?;

        let nonce = Nonce::mint();
        let message = ChallengeBuilder::build(&visitor, &owner, &area, chain_id, &nonce);
        debug!(visitor = %visitor, owner = %owner, area = %area, "Signing content challenge");

        let signature = self.signer.sign(&visitor, &message).await?;

        Ok(SignedChallenge {
            owner,
            area,
            message,
            headers: AuthHeaders {
                visitor,
                nonce,
                signature,
                chain_id,
            },
        })
    }
}
