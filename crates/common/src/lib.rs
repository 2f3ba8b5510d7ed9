//! Podreel Common Utilities
//!
//! Shared infrastructure for all Podreel crates:
//! - Error types and result aliases
//! - Stage timers and render session tokens
//! - Timecode parsing and formatting
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod timecode;

pub use clock::*;
pub use config::*;
pub use error::*;
