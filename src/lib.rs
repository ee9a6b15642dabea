//! Gated Content Library
//!
//! Wallet-signature gated access to per-owner content areas. The client side
//! builds a canonical challenge and has the visitor's wallet sign it; the
//! server side recovers the signer, checks chain and nonce freshness, and only
//! then opens the content store.

pub mod audit;
pub mod auth;
pub mod client;
pub mod config;
pub mod content;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod server;
pub mod validation;
pub mod wallet;
