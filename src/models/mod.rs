// This module re-exports the data model types for convenience,
// so we can "use crate::models::*" easily.
pub mod identity;
pub mod session;

pub use identity::*;
pub use session::*;
