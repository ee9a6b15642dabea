//! Error types for the gated content gateway.

use thiserror::Error;

/// Main error type for the gateway and its client.
#[derive(Error, Debug)]
pub enum GateError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Listener and connection errors.
    #[error("Server error: {message}")]
    Server { message: String },

    /// Authorization errors (denials and malformed credentials).
    #[error("Authorization error: {kind}")]
    Auth { kind: AuthErrorKind },

    /// Client-side identity and signing errors.
    #[error("Client error: {kind}")]
    Client { kind: ClientErrorKind },

    /// Validation errors.
    #[error("Validation error: {kind}")]
    Validation { kind: ValidationErrorKind },

    /// Content store errors.
    #[error("Content error: {kind}")]
    Content { kind: ContentErrorKind },

    /// Request/response protocol errors.
    #[error("Protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// Network or streaming I/O failed while content was being delivered.
    #[error("Transport failure: {message}")]
    Transport { message: String },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Authorization error kinds.
#[derive(Error, Debug)]
pub enum AuthErrorKind {
    #[error("Request denied: {reason}")]
    Denied { reason: DenialReason },

    #[error("Missing header: {name}")]
    MissingHeader { name: &'static str },

    #[error("Invalid header '{name}': {message}")]
    InvalidHeader { name: &'static str, message: String },
}

/// Why the authorizer refused a request.
///
/// The full reason is only ever logged server-side. Clients see at most
/// [`DenialReason::public_code`], which does not distinguish a replayed nonce
/// from an expired one.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    #[error("recovered signer does not match the claimed visitor")]
    AddressMismatch,

    #[error("chain id is not accepted by this gateway")]
    ChainMismatch,

    #[error("nonce already consumed")]
    NonceReplayed,

    #[error("nonce outside the accepted validity window")]
    NonceExpired,

    #[error("nonce store is full of live nonces")]
    NonceStoreFull,
}

impl DenialReason {
    /// Internal reason code, used in logs and the audit trail.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AddressMismatch => "ADDRESS_MISMATCH",
            Self::ChainMismatch => "CHAIN_MISMATCH",
            Self::NonceReplayed => "NONCE_REPLAYED",
            Self::NonceExpired => "NONCE_EXPIRED",
            Self::NonceStoreFull => "NONCE_STORE_FULL",
        }
    }

    /// Reason code safe to hand back to a client.
    pub fn public_code(&self) -> &'static str {
        match self {
            Self::AddressMismatch => "ADDRESS_MISMATCH",
            Self::ChainMismatch => "CHAIN_MISMATCH",
            Self::NonceReplayed | Self::NonceExpired | Self::NonceStoreFull => "NONCE_REJECTED",
        }
    }
}

/// Client-side error kinds.
#[derive(Error, Debug)]
pub enum ClientErrorKind {
    #[error("Identity unavailable: no {missing} reported by the wallet provider")]
    IdentityUnavailable { missing: &'static str },

    #[error("No wallet connected")]
    SignerUnavailable,

    #[error("Signature request rejected")]
    SignatureRejected,

    #[error("Signature request timed out after {timeout_secs} seconds")]
    SignerTimeout { timeout_secs: u64 },

    #[error("Signature request canceled")]
    SignCanceled,

    #[error("Another challenge is already awaiting a signature")]
    ChallengeInFlight,

    #[error("Wallet provider failed: {message}")]
    Provider { message: String },
}

/// Validation error kinds.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("Invalid area '{area}': {message}")]
    InvalidArea { area: String, message: String },

    #[error("Invalid file name '{file_name}': {message}")]
    InvalidFileName { file_name: String, message: String },

    #[error("Invalid address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    #[error("Invalid nonce: {message}")]
    InvalidNonce { message: String },

    #[error("Invalid signature encoding: {message}")]
    InvalidSignature { message: String },
}

/// Content store error kinds.
#[derive(Error, Debug)]
pub enum ContentErrorKind {
    #[error("Content not found: {what}")]
    NotFound { what: String },

    #[error("Authorization scope does not cover {owner}/{area}")]
    ScopeMismatch { owner: String, area: String },
}

/// Protocol error kinds.
#[derive(Error, Debug)]
pub enum ProtocolErrorKind {
    #[error("No route for {method} {path}")]
    NotFound { method: String, path: String },

    #[error("Request timed out after {timeout_secs} seconds")]
    RequestTimeout { timeout_secs: u64 },

    #[error("Too many requests")]
    RateLimited,

    #[error("Service unavailable: {reason}")]
    Unavailable { reason: String },
}

impl GateError {
    /// Shorthand for an authorization denial.
    pub fn denied(reason: DenialReason) -> Self {
        Self::Auth {
            kind: AuthErrorKind::Denied { reason },
        }
    }

    /// Stable error code reported to clients and written to the audit log.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth {
                kind: AuthErrorKind::Denied { .. },
            } => "ACCESS_DENIED",
            Self::Auth { .. } => "AUTH_REQUIRED",
            Self::Client { .. } => "CLIENT_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Content {
                kind: ContentErrorKind::NotFound { .. },
            } => "CONTENT_NOT_FOUND",
            Self::Content { .. } => "ACCESS_DENIED",
            Self::Protocol {
                kind: ProtocolErrorKind::NotFound { .. },
            } => "NOT_FOUND",
            Self::Protocol {
                kind: ProtocolErrorKind::RequestTimeout { .. },
            } => "REQUEST_TIMEOUT",
            Self::Protocol {
                kind: ProtocolErrorKind::RateLimited,
            } => "RATE_LIMITED",
            Self::Protocol {
                kind: ProtocolErrorKind::Unavailable { .. },
            } => "SERVICE_UNAVAILABLE",
            Self::Transport { .. } => "TRANSPORT_FAILURE",
            Self::Config { .. }
            | Self::Server { .. }
            | Self::Io(_)
            | Self::Serialization(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type alias for gateway operations.
pub type GateResult<T> = Result<T, GateError>;
