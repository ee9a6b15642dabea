//! Wire protocol module.
//!
//! Defines the signed challenge, its encoding, and the request/response types
//! exchanged with the gateway.
//!
//! ## Request Format
//!
//! Content requests are plain HTTP GETs. The owner, area and file name travel
//! in the path; the signed claim travels in four headers:
//! ```text
//! X-Visitor-UP: <visitor address>
//! X-Nonce:      <nonce>
//! X-Signature:  <0x-prefixed hex, 65 bytes>
//! X-Chain-Id:   <decimal chain id>
//! ```

mod headers;
mod message;
mod nonce;
mod request;
mod response;
mod signature;

pub use headers::{AuthHeaders, CHAIN_ID_HEADER, NONCE_HEADER, SIGNATURE_HEADER, VISITOR_HEADER};
pub use message::{CanonicalMessage, ChallengeBuilder, CHALLENGE_HEADER};
pub use nonce::Nonce;
pub use request::AuthorizedRequest;
pub use response::{ErrorResponse, Response};
pub use signature::{Signature, SIGNATURE_LENGTH};
