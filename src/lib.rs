//! Library exports for fitroom-session, shared between the embedding app and tests.

pub mod config;
pub mod errors;
pub mod models;
pub mod profile;
pub mod providers;
pub mod session;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;
