//! Challenge nonces.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

use crate::error::{GateError, ValidationErrorKind};

/// Maximum nonce length.
const MAX_NONCE_LENGTH: usize = 128;

/// Random bytes in a minted nonce.
const NONCE_RANDOM_BYTES: usize = 16;

/// A single-use challenge token.
///
/// Minted nonces have the form `<unix-seconds>-<32 hex chars>`, which lets the
/// authorizer bound their age without keeping any issuance state. Nonces in any
/// other shape are opaque and carry no issuance time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nonce(String);

impl Nonce {
    /// Mint a fresh nonce stamped with `issued_at` (unix seconds).
    pub fn mint_at(issued_at: u64) -> Self {
        let mut random = [0u8; NONCE_RANDOM_BYTES];
        rand::thread_rng().fill_bytes(&mut random);
        Self(format!("{}-{}", issued_at, hex::encode(random)))
    }

    /// Mint a fresh nonce stamped with the current time.
    pub fn mint() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::mint_at(now)
    }

    /// Parse a nonce received from a client.
    pub fn parse(value: &str) -> Result<Self, GateError> {
        if value.is_empty() || value.len() > MAX_NONCE_LENGTH {
            return Err(GateError::Validation {
                kind: ValidationErrorKind::InvalidNonce {
                    message: format!("length must be between 1 and {}", MAX_NONCE_LENGTH),
                },
            });
        }

        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
        if !value.chars().all(allowed) {
            return Err(GateError::Validation {
                kind: ValidationErrorKind::InvalidNonce {
                    message: "contains disallowed characters".to_string(),
                },
            });
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Issuance time embedded by [`Nonce::mint_at`], if this nonce has that shape.
    pub fn issued_at(&self) -> Option<u64> {
        let (timestamp, random) = self.0.split_once('-')?;
        let well_formed = !timestamp.is_empty()
            && timestamp.chars().all(|c| c.is_ascii_digit())
            && random.len() == NONCE_RANDOM_BYTES * 2
            && random.chars().all(|c| c.is_ascii_hexdigit());
        if !well_formed {
            return None;
        }
        timestamp.parse().ok()
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
