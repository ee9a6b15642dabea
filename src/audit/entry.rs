//! Audit entry types.
//!
//! Defines the structure of audit log entries.

use std::net::SocketAddr;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

/// What a content request asked for, as far as it could be parsed.
///
/// Fields stay `None` when the request failed before they were known, for
/// example a malformed path or missing headers.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRequest {
    /// Unique identifier for the request.
    pub request_id: Uuid,
    /// Operation name (`content.list` or `content.fetch`).
    pub operation: &'static str,
    /// Remote address of the connection.
    pub peer: SocketAddr,
    /// Owner named in the path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Area named in the path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    /// File requested by a fetch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Visitor claimed in the request headers. Unverified unless the result
    /// is a success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor: Option<String>,
}

impl AuditRequest {
    pub fn new(request_id: Uuid, operation: &'static str, peer: SocketAddr) -> Self {
        Self {
            request_id,
            operation,
            peer,
            owner: None,
            area: None,
            file_name: None,
            visitor: None,
        }
    }
}

/// A single audit log entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// RFC 3339 timestamp when the request finished.
    pub timestamp: String,
    #[serde(flatten)]
    pub request: AuditRequest,
    /// Outcome of the request.
    pub result: AuditResult,
    /// Handling duration in milliseconds.
    pub duration_ms: u64,
}

impl AuditEntry {
    /// Create a new audit entry for a served request.
    pub fn success(request: AuditRequest, data: Option<serde_json::Value>, duration_ms: u64) -> Self {
        Self {
            timestamp: now(),
            request,
            result: AuditResult::Success { data },
            duration_ms,
        }
    }

    /// Create a new audit entry for a refused or failed request.
    ///
    /// `error_message` is the internal reason and may be more specific than
    /// what the client was told.
    pub fn failure(
        request: AuditRequest,
        error_code: impl Into<String>,
        error_message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            timestamp: now(),
            request,
            result: AuditResult::Failure {
                error_code: error_code.into(),
                error_message: error_message.into(),
            },
            duration_ms,
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Result of a request for audit purposes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum AuditResult {
    /// Request served.
    #[serde(rename = "success")]
    Success {
        /// Optional result data.
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    /// Request refused or failed.
    #[serde(rename = "failure")]
    Failure {
        /// Error code.
        error_code: String,
        /// Error message.
        error_message: String,
    },
}
