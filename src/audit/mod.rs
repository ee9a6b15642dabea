//! Audit logging module.
//!
//! Records one entry per content request: who asked for what, from where,
//! and how it ended. Logs are written in JSON lines format for easy parsing
//! by log analysis tools.

mod entry;
mod logger;

pub use entry::{AuditEntry, AuditRequest, AuditResult};
pub use logger::AuditLogger;
