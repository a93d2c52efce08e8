//! Shared types for the fingerlink acquisition engine.
//!
//! Holds the host-facing error type, protocol constants, acquisition
//! options and event payloads, and the engine configuration.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
