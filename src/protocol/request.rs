//! The per-request authorization claim.

use hyper::header::HeaderMap;

use crate::error::GateError;
use crate::identity::{Address, ChainId};
use crate::validation::{validate_area, Area};

use super::{AuthHeaders, CanonicalMessage, ChallengeBuilder, Nonce, Signature};

/// Everything the authorizer needs to judge one request.
///
/// Built from the request headers plus the owner and area path segments and
/// dropped once the request is answered.
#[derive(Debug, Clone)]
pub struct AuthorizedRequest {
    /// Address the caller claims to control.
    pub visitor: Address,
    /// Owner whose content is requested.
    pub owner: Address,
    /// Area within the owner's namespace.
    pub area: Area,
    /// Chain the signature was made for.
    pub chain_id: ChainId,
    /// Single-use challenge token.
    pub nonce: Nonce,
    /// `personal_sign` signature over the canonical message.
    pub signature: Signature,
}

impl AuthorizedRequest {
    /// Assemble a claim from decoded headers and validated path parameters.
    pub fn new(headers: AuthHeaders, owner: Address, area: Area) -> Self {
        Self {
            visitor: headers.visitor,
            owner,
            area,
            chain_id: headers.chain_id,
            nonce: headers.nonce,
            signature: headers.signature,
        }
    }

    /// Parse a claim from raw request parts.
    pub fn from_parts(headers: &HeaderMap, owner: &str, area: &str) -> Result<Self, GateError> {
        let owner = owner.parse::<Address>()?;
        let area = validate_area(area)?;
        let headers = AuthHeaders::from_header_map(headers)?;
        Ok(Self::new(headers, owner, area))
    }

    /// The message the visitor must have signed.
    pub fn signing_message(&self) -> CanonicalMessage {
        ChallengeBuilder::build(
            &self.visitor,
            &self.owner,
            &self.area,
            self.chain_id,
            &self.nonce,
        )
    }
}
