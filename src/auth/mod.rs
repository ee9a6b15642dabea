//! Authentication module.
//!
//! Handles signer recovery, request authorization, nonce replay tracking,
//! and per-client rate limiting.

mod authorizer;
mod nonce;
mod rate_limit;
mod recover;

pub use authorizer::{Authorization, NoncePolicy, RequestAuthorizer, Verdict};
pub use nonce::{NonceCheck, NonceKey, NonceStore, MAX_NONCE_TTL};
pub use rate_limit::RateLimiter;
pub use recover::recover_signer;
