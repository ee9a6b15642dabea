//! Audit logger for writing audit entries to file.
//!
//! Writes structured audit entries as JSON lines (one JSON object per line)
//! for easy parsing by log analysis tools.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::GateError;

use super::entry::AuditEntry;

/// Logger for audit entries.
///
/// Writes audit entries to a file in JSON lines format.
/// Thread-safe via internal mutex.
pub struct AuditLogger {
    /// The file handle wrapped in a mutex for thread safety.
    file: Mutex<File>,
    /// Path to the audit log file.
    path: PathBuf,
}

impl AuditLogger {
    /// Create a new audit logger that writes to the specified path.
    ///
    /// Creates the parent directory if it doesn't exist.
    /// Opens the file in append mode.
    pub fn new(path: &Path) -> Result<Self, GateError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                debug!(path = %parent.display(), "Creating audit log directory");
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        debug!(path = %path.display(), "Audit logger initialized");

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Log an audit entry.
    ///
    /// Serializes the entry to JSON and writes it as a single line.
    /// Syncs the file after writing for durability.
    pub fn log(&self, entry: &AuditEntry) -> Result<(), GateError> {
        let json = serde_json::to_string(entry)?;

        let mut file = self.file.lock().map_err(|e| GateError::Server {
            message: format!("Failed to acquire audit log lock: {}", e),
        })?;

        writeln!(file, "{}", json)?;

        if let Err(e) = file.sync_data() {
            warn!(error = %e, "Failed to sync audit log");
        }

        debug!(
            request_id = %entry.request.request_id,
            operation = entry.request.operation,
            "Audit entry logged"
        );

        Ok(())
    }

    /// Get the path to the audit log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditRequest;
    use std::io::Read;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn request(operation: &'static str) -> AuditRequest {
        AuditRequest::new(Uuid::nil(), operation, "127.0.0.1:4000".parse().unwrap())
    }

    fn read_lines(path: &Path) -> Vec<String> {
        let mut content = String::new();
        File::open(path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_logger_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("subdir/audit.log");

        let logger = AuditLogger::new(&log_path).unwrap();
        assert!(log_path.parent().unwrap().exists());
        assert_eq!(logger.path(), log_path);
    }

    #[test]
    fn test_logger_writes_json_lines() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::new(&log_path).unwrap();

        logger
            .log(&AuditEntry::success(request("content.list"), None, 10))
            .unwrap();
        logger
            .log(&AuditEntry::failure(
                request("content.fetch"),
                "ACCESS_DENIED",
                "ADDRESS_MISMATCH",
                5,
            ))
            .unwrap();

        let lines = read_lines(&log_path);
        assert_eq!(lines.len(), 2);

        let parsed1: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed1["operation"], "content.list");
        assert_eq!(parsed1["result"]["status"], "success");

        let parsed2: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(parsed2["operation"], "content.fetch");
        assert_eq!(parsed2["result"]["status"], "failure");
        assert_eq!(parsed2["result"]["error_message"], "ADDRESS_MISMATCH");
    }

    #[test]
    fn test_logger_appends_to_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");

        for _ in 0..2 {
            let logger = AuditLogger::new(&log_path).unwrap();
            logger
                .log(&AuditEntry::success(request("content.list"), None, 1))
                .unwrap();
        }

        assert_eq!(read_lines(&log_path).len(), 2);
    }
}
