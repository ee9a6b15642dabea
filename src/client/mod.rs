//! Visitor-side client.
//!
//! Reads identity from the wallet provider, builds the canonical challenge,
//! has it signed, and packages the result as request headers.

mod challenge;
mod signer;

pub use challenge::{ChallengeClient, SignedChallenge};
pub use signer::{Signer, DEFAULT_SIGN_TIMEOUT};
