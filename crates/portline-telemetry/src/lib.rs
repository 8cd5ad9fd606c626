//! # Portline Telemetry
//!
//! Structured logging for Portline services and tools.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use portline_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("Failed to init telemetry");
//!     // Port events are now logged
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `portline` | Service name on log lines |
//! | `PORTLINE_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `PORTLINE_CONSOLE_OUTPUT` | `true` | Write logs to the console |
//! | `PORTLINE_JSON_LOGS` | `false` | JSON output (defaults on inside containers) |

#![warn(missing_docs)]

mod config;
mod logging;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::env_filter;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A global subscriber is already installed, or installation failed
    #[error("Failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),

    /// The log level or filter directives could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging for the process.
///
/// Returns a guard to hold for the lifetime of the application; dropping it
/// logs the shutdown.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    tracing_setup::init_subscriber(&config)?;
    tracing::info!(
        service = %config.service_name,
        json = config.json_logs,
        level = %config.log_level,
        "[portline] telemetry initialized"
    );
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    /// Service name the subscriber was installed for.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "[portline] shutting down telemetry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let config = TelemetryConfig::default().with_log_level("warn");
        let first = init_telemetry(config.clone());
        let second = init_telemetry(config);
        assert!(matches!(second, Err(TelemetryError::SubscriberInit(_))));
        if let Ok(guard) = first {
            assert_eq!(guard.service_name(), "portline");
        }
    }
}
