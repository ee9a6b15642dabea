//! Error types for the gated content gateway.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
