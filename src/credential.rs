//! Credential-domain value types: query targets, redacted secrets, and signature records.

pub mod secret;
pub mod signature;
pub mod target;

pub use secret::*;
pub use signature::*;
pub use target::*;
