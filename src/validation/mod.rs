//! Input validation module.
//!
//! Provides validators for the path parameters of content requests.

mod area;
mod file_name;

pub use area::{validate_area, Area};
pub use file_name::{validate_file_name, FileName};
