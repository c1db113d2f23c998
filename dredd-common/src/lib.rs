//! Shared types for the Dredd knowledge-extraction service.
//!
//! Carries the pieces every member crate needs: the common error type,
//! environment configuration, and the bus contract (subjects + payloads).

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
