//! Structured logging.
//!
//! Logs go to stderr: stdout is reserved for rendered documents.

use crate::{LogFormat, TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging subsystem.
///
/// Sets up tracing-subscriber with either JSON or pretty format,
/// respecting the configured log level.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    // Build the env filter from config or RUST_LOG
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => init_json_logging(filter),
        LogFormat::Pretty => init_pretty_logging(filter),
    }
}

fn init_json_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let json_layer = fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_file(false)
        .with_line_number(false)
        .flatten_event(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

fn init_pretty_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let pretty_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(pretty_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

/// Standard log event names.
pub mod events {
    /// A document has been bundled.
    pub const BUNDLE_COMPLETED: &str = "bundle_completed";

    /// A circular reference was left unresolved.
    pub const CIRCULAR_REFERENCE: &str = "circular_reference";

    /// An upstream document has been loaded for a proxy operation.
    pub const UPSTREAM_LOADED: &str = "upstream_loaded";

    /// An upstream document has been pruned and namespaced.
    pub const UPSTREAM_PRUNED: &str = "upstream_pruned";

    /// A proxy operation has been merged with its upstream.
    pub const OPERATION_MERGED: &str = "operation_merged";

    /// A proxy document has been compiled.
    pub const PROXY_COMPILED: &str = "proxy_compiled";
}

/// Helper macros for structured logging with standard fields.
///
/// These wrap the tracing macros to ensure consistent field naming.
#[macro_export]
macro_rules! log_bundle_completed {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::BUNDLE_COMPLETED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_circular_reference {
    ($($field:tt)*) => {
        tracing::warn!(
            event = $crate::logging::events::CIRCULAR_REFERENCE,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_upstream_loaded {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::UPSTREAM_LOADED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_upstream_pruned {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::UPSTREAM_PRUNED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_operation_merged {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::OPERATION_MERGED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_proxy_compiled {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::PROXY_COMPILED,
            $($field)*
        )
    };
}
