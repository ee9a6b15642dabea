//! Identity module.
//!
//! Account addresses, chain identifiers, and the live identity reported by
//! the wallet provider.

mod address;
mod source;

pub(crate) use address::keccak256;
pub use address::{Address, ChainId};
pub use source::{IdentitySnapshot, IdentitySource};
