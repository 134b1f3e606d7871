//! Logging infrastructure for apiweld.
//!
//! This crate provides:
//! - Structured logging to stderr, JSON or human-readable
//! - Standard event names and helper macros used by the compiler
//!
//! # Usage
//!
//! ```ignore
//! use apiweld_telemetry::{init_logging, LogFormat, TelemetryConfig};
//!
//! let config = TelemetryConfig::new()
//!     .with_log_level("info")
//!     .with_log_format(LogFormat::Json);
//!
//! init_logging(&config)?;
//! ```

pub mod config;
pub mod logging;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::{events, init_logging};

use thiserror::Error;

/// Telemetry errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Unrecognised log format name.
    #[error("unknown log format '{0}' (expected 'pretty' or 'json')")]
    UnknownFormat(String),
}
