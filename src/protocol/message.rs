//! The canonical challenge message.
//!
//! Signing and verification both go through [`ChallengeBuilder::build`], so the
//! byte layout below is the single definition of the wire contract:
//!
//! ```text
//! Gated content access request
//! Visitor: <checksummed visitor address>
//! Owner: <checksummed owner address>
//! Area: <area>
//! Chain ID: <decimal chain id>
//! Nonce: <nonce>
//! ```
//!
//! Lines are joined with `\n` and there is no trailing newline. None of the
//! field types can contain `\n`, which is enforced by their constructors.

use std::fmt;

use crate::error::GateError;
use crate::identity::{keccak256, Address, ChainId};
use crate::validation::{validate_area, Area};

use super::Nonce;

/// First line of every challenge.
pub const CHALLENGE_HEADER: &str = "Gated content access request";

/// Prefix applied by `personal_sign` (EIP-191, version 0x45).
const PERSONAL_SIGN_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// The exact text a visitor signs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMessage(String);

impl CanonicalMessage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Digest that `personal_sign` actually signs.
    pub fn personal_sign_hash(&self) -> [u8; 32] {
        let mut payload = Vec::with_capacity(PERSONAL_SIGN_PREFIX.len() + 4 + self.0.len());
        payload.extend_from_slice(PERSONAL_SIGN_PREFIX.as_bytes());
        payload.extend_from_slice(self.0.len().to_string().as_bytes());
        payload.extend_from_slice(self.0.as_bytes());
        keccak256(&payload)
    }
}

impl fmt::Display for CanonicalMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds [`CanonicalMessage`]s.
pub struct ChallengeBuilder;

impl ChallengeBuilder {
    /// Encode a claim.
    pub fn build(
        visitor: &Address,
        owner: &Address,
        area: &Area,
        chain_id: ChainId,
        nonce: &Nonce,
    ) -> CanonicalMessage {
        CanonicalMessage(format!(
            "{}\nVisitor: {}\nOwner: {}\nArea: {}\nChain ID: {}\nNonce: {}",
            CHALLENGE_HEADER,
            visitor.to_checksum(),
            owner.to_checksum(),
            area.as_str(),
            chain_id.0,
            nonce.as_str(),
        ))
    }

    /// Encode a claim whose area has not been validated yet.
    ///
    /// Fails with `InvalidArea` if the area cannot be encoded safely.
    pub fn build_checked(
        visitor: &Address,
        owner: &Address,
        area: &str,
        chain_id: ChainId,
        nonce: &Nonce,
    ) -> Result<CanonicalMessage, GateError> {
        let area = validate_area(area)?;
        Ok(Self::build(visitor, owner, &area, chain_id, nonce))
    }
}
