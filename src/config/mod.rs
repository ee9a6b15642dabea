//! Configuration module for the content gateway.
//!
//! Handles loading and validating gateway configuration from TOML files.

mod settings;

pub use settings::*;
