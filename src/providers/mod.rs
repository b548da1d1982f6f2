pub mod base;
pub mod rest;

// Re-export the primary provider items so code outside can do
// "use crate::providers::{IdentityProvider, create_identity_provider};"
pub use base::*;
