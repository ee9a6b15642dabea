//! Content area name validation.
//!
//! Area names are embedded in the signed challenge and used as a directory
//! name by the filesystem store, so they are restricted to a charset that
//! contains neither the challenge's line separator nor path separators.

use std::fmt;

use serde::Serialize;

use crate::error::{GateError, ValidationErrorKind};

/// Maximum length for area names.
const MAX_AREA_LENGTH: usize = 64;

/// A validated content area name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Area(String);

impl Area {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Area {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn invalid_area(area: &str, message: impl Into<String>) -> GateError {
    GateError::Validation {
        kind: ValidationErrorKind::InvalidArea {
            area: area.escape_debug().to_string(),
            message: message.into(),
        },
    }
}

/// Validate an area name.
///
/// Rules:
/// - Must not be empty
/// - Must not exceed 64 characters
/// - May only contain ASCII letters, digits, underscores, and hyphens
pub fn validate_area(area: &str) -> Result<Area, GateError> {
    if area.is_empty() {
        return Err(invalid_area(area, "Area cannot be empty"));
    }

    if area.len() > MAX_AREA_LENGTH {
        return Err(invalid_area(
            area,
            format!("Area exceeds maximum length of {} characters", MAX_AREA_LENGTH),
        ));
    }

    if let Some(c) = area
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(invalid_area(
            area,
            format!("Area contains disallowed character {:?}", c),
        ));
    }

    Ok(Area(area.to_string()))
}
