//! JSON response envelope for gateway errors and status replies.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AuthErrorKind, DenialReason, GateError};

/// Client-facing message for an error code.
///
/// Detailed error text stays in the server log; clients only get a generic
/// message so responses cannot be used to probe internal state.
fn sanitize_error_message(code: &str) -> &'static str {
    match code {
        "ACCESS_DENIED" => "Access denied",
        "AUTH_REQUIRED" => "Missing or malformed authorization headers",
        "VALIDATION_ERROR" => "Invalid request parameters",
        "CONTENT_NOT_FOUND" => "Content not found",
        "NOT_FOUND" => "Not found",
        "RATE_LIMITED" => "Too many requests",
        "REQUEST_TIMEOUT" => "Request timed out",
        "SERVICE_UNAVAILABLE" => "Service temporarily unavailable",
        "TRANSPORT_FAILURE" => "Content transfer failed",
        "INTERNAL_ERROR" => "Internal server error",
        _ => "An error occurred",
    }
}

/// Error envelope returned by the gateway.
///
/// Successful requests answer with their payload directly; only failures are
/// wrapped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Always `false`; kept so clients can branch on one field.
    pub success: bool,

    /// Unique identifier for this request/response pair.
    pub request_id: Uuid,

    /// Error details.
    pub error: ErrorResponse,
}

/// Error details in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "ACCESS_DENIED", "VALIDATION_ERROR").
    pub code: String,

    /// Human-readable error message.
    pub message: String,

    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Response {
    /// Create an error response for `err`.
    ///
    /// The message is replaced by a generic one for the error's code. A denial
    /// reason is attached only when `expose_reason` is set, and then only in
    /// its public form.
    pub fn from_error(request_id: Uuid, err: &GateError, expose_reason: bool) -> Self {
        let code = err.code();

        debug!(
            request_id = %request_id,
            code = code,
            message = %err,
            "Error response (sanitized for client)"
        );

        let details = match err {
            GateError::Auth {
                kind: AuthErrorKind::Denied { reason },
            } if expose_reason => Some(denial_details(reason)),
            _ => None,
        };

        Self {
            success: false,
            request_id,
            error: ErrorResponse {
                code: code.to_string(),
                message: sanitize_error_message(code).to_string(),
                details,
            },
        }
    }
}

fn denial_details(reason: &DenialReason) -> serde_json::Value {
    serde_json::json!({ "reason": reason.public_code() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ContentErrorKind, ValidationErrorKind};

    #[test]
    fn test_denial_hides_reason_by_default() {
        let err = GateError::denied(DenialReason::NonceReplayed);
        let response = Response::from_error(Uuid::nil(), &err, false);

        let error = response.error;
        assert_eq!(error.code, "ACCESS_DENIED");
        assert_eq!(error.message, "Access denied");
        assert!(error.details.is_none());
    }

    #[test]
    fn test_exposed_reason_does_not_leak_nonce_state() {
        let replayed = Response::from_error(
            Uuid::nil(),
            &GateError::denied(DenialReason::NonceReplayed),
            true,
        );
        let expired = Response::from_error(
            Uuid::nil(),
            &GateError::denied(DenialReason::NonceExpired),
            true,
        );

        let replayed = serde_json::to_string(&replayed.error).unwrap();
        let expired = serde_json::to_string(&expired.error).unwrap();
        assert_eq!(replayed, expired);
        assert!(replayed.contains("NONCE_REJECTED"));
    }

    #[test]
    fn test_exhausted_nonce_store_reads_as_unavailable() {
        let err = GateError::Protocol {
            kind: crate::error::ProtocolErrorKind::Unavailable {
                reason: DenialReason::NonceStoreFull.to_string(),
            },
        };
        let response = Response::from_error(Uuid::nil(), &err, true);
        assert_eq!(response.error.code, "SERVICE_UNAVAILABLE");
        assert_eq!(response.error.message, "Service temporarily unavailable");
        assert!(response.error.details.is_none());
    }

    #[test]
    fn test_internal_details_are_sanitized() {
        let err = GateError::Validation {
            kind: ValidationErrorKind::InvalidFileName {
                file_name: "../../etc/passwd".to_string(),
                message: "File name contains disallowed characters".to_string(),
            },
        };
        let response = Response::from_error(Uuid::nil(), &err, true);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("passwd"));
        assert!(json.contains("VALIDATION_ERROR"));
    }

    #[test]
    fn test_response_serialization() {
        let err = GateError::Content {
            kind: ContentErrorKind::NotFound {
                what: "clip.mp4".to_string(),
            },
        };
        let response = Response::from_error(Uuid::nil(), &err, false);
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"request_id\""));
        assert!(!json.contains("\"details\"")); // Should be skipped when None
    }
}
