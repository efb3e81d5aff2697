//! Error handling
//!
//! Defines error types and handling for the deployment server.

pub mod handlers;
pub mod types;

pub use types::*;
