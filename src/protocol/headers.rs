//! Authorization headers attached to every gated content request.

use hyper::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{AuthErrorKind, GateError};
use crate::identity::{Address, ChainId};

use super::{Nonce, Signature};

/// Visitor address header.
pub const VISITOR_HEADER: &str = "x-visitor-up";
/// Nonce header.
pub const NONCE_HEADER: &str = "x-nonce";
/// Hex-encoded signature header.
pub const SIGNATURE_HEADER: &str = "x-signature";
/// Decimal chain id header.
pub const CHAIN_ID_HEADER: &str = "x-chain-id";

/// The signed claim as carried in request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub visitor: Address,
    pub nonce: Nonce,
    pub signature: Signature,
    pub chain_id: ChainId,
}

impl AuthHeaders {
    /// Header name/value pairs, in a fixed order.
    pub fn to_pairs(&self) -> [(&'static str, String); 4] {
        [
            (VISITOR_HEADER, self.visitor.to_checksum()),
            (NONCE_HEADER, self.nonce.to_string()),
            (SIGNATURE_HEADER, self.signature.to_hex()),
            (CHAIN_ID_HEADER, self.chain_id.to_string()),
        ]
    }

    /// Insert the headers into an outgoing request's header map.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), GateError> {
        for (name, value) in self.to_pairs() {
            let value = HeaderValue::from_str(&value).map_err(|e| GateError::Auth {
                kind: AuthErrorKind::InvalidHeader {
                    name,
                    message: e.to_string(),
                },
            })?;
            headers.insert(HeaderName::from_static(name), value);
        }
        Ok(())
    }

    /// Extract and decode the headers from an incoming request.
    pub fn from_header_map(headers: &HeaderMap) -> Result<Self, GateError> {
        let visitor = required(headers, VISITOR_HEADER)?
            .parse::<Address>()
            .map_err(|e| invalid(VISITOR_HEADER, e))?;

        let nonce =
            Nonce::parse(required(headers, NONCE_HEADER)?).map_err(|e| invalid(NONCE_HEADER, e))?;

        let signature = Signature::from_hex(required(headers, SIGNATURE_HEADER)?)
            .map_err(|e| invalid(SIGNATURE_HEADER, e))?;

        let chain_id = required(headers, CHAIN_ID_HEADER)?
            .parse::<ChainId>()
            .map_err(|e| invalid(CHAIN_ID_HEADER, e))?;

        Ok(Self {
            visitor,
            nonce,
            signature,
            chain_id,
        })
    }
}

fn required<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, GateError> {
    let value = headers.get(name).ok_or(GateError::Auth {
        kind: AuthErrorKind::MissingHeader { name },
    })?;
    value.to_str().map_err(|e| invalid(name, e))
}

fn invalid(name: &'static str, err: impl std::fmt::Display) -> GateError {
    GateError::Auth {
        kind: AuthErrorKind::InvalidHeader {
            name,
            message: err.to_string(),
        },
    }
}
