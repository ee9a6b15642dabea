//! Recoverable secp256k1 signatures as produced by `personal_sign`.

use std::fmt;

use crate::error::{GateError, ValidationErrorKind};

/// Encoded length: `r (32) || s (32) || v (1)`.
pub const SIGNATURE_LENGTH: usize = 65;

/// A 65-byte recoverable signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    pub const fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    /// The `r || s` half.
    pub fn rs(&self) -> &[u8] {
        &self.0[..64]
    }

    /// Recovery parity, normalized from `27`/`28` or `0`/`1`.
    pub fn parity(&self) -> Option<u8> {
        match self.0[64] {
            0 | 1 => Some(self.0[64]),
            27 | 28 => Some(self.0[64] - 27),
            _ => None,
        }
    }

    /// Decode from hex, with or without a `0x` prefix.
    pub fn from_hex(value: &str) -> Result<Self, GateError> {
        let digits = value.strip_prefix("0x").unwrap_or(value);
        let bytes = hex::decode(digits).map_err(|e| GateError::Validation {
            kind: ValidationErrorKind::InvalidSignature {
                message: e.to_string(),
            },
        })?;

        let bytes: [u8; SIGNATURE_LENGTH] =
            bytes.try_into().map_err(|b: Vec<u8>| GateError::Validation {
                kind: ValidationErrorKind::InvalidSignature {
                    message: format!("expected {} bytes, got {}", SIGNATURE_LENGTH, b.len()),
                },
            })?;

        Ok(Self(bytes))
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_with_and_without_prefix() {
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        bytes[0] = 0xab;
        bytes[64] = 27;
        let sig = Signature::from_bytes(bytes);

        let hex = sig.to_hex();
        assert!(hex.starts_with("0xab"));
        assert_eq!(Signature::from_hex(&hex).unwrap(), sig);
        assert_eq!(Signature::from_hex(&hex[2..]).unwrap(), sig);
    }

    #[test]
    fn test_parity_normalization() {
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        for (v, expected) in [(0u8, Some(0u8)), (1, Some(1)), (27, Some(0)), (28, Some(1)), (29, None)] {
            bytes[64] = v;
            assert_eq!(Signature::from_bytes(bytes).parity(), expected);
        }
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(Signature::from_hex("0xdeadbeef").is_err());
        assert!(Signature::from_hex("not hex").is_err());
    }
}
