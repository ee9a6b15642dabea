//! File name validation for fetch requests.

use std::fmt;

use crate::error::{GateError, ValidationErrorKind};

/// Maximum file name length in bytes (common filesystem limit).
const MAX_FILE_NAME_LENGTH: usize = 255;

/// A file name that is safe to join onto an area directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName(String);

impl FileName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn invalid_file_name(file_name: &str, message: &str) -> GateError {
    GateError::Validation {
        kind: ValidationErrorKind::InvalidFileName {
            file_name: file_name.escape_debug().to_string(),
            message: message.to_string(),
        },
    }
}

/// Validate a file name.
///
/// Rules:
/// - Must not be empty or exceed 255 bytes
/// - Must not start with a dot (hidden files and `..`)
/// - May only contain ASCII letters, digits, dots, underscores, hyphens and spaces
/// - Must not end with a space or a dot
pub fn validate_file_name(file_name: &str) -> Result<FileName, GateError> {
    if file_name.is_empty() {
        return Err(invalid_file_name(file_name, "File name cannot be empty"));
    }

    if file_name.len() > MAX_FILE_NAME_LENGTH {
        return Err(invalid_file_name(file_name, "File name too long"));
    }

    if file_name.starts_with('.') {
        return Err(invalid_file_name(file_name, "File name cannot start with a dot"));
    }

    if file_name.ends_with('.') || file_name.ends_with(' ') {
        return Err(invalid_file_name(
            file_name,
            "File name cannot end with a dot or space",
        ));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ');
    if !file_name.chars().all(allowed) {
        return Err(invalid_file_name(
            file_name,
            "File name contains disallowed characters",
        ));
    }

    Ok(FileName(file_name.to_string()))
}
