//! # Logging & Tracing Infrastructure
//!
//! Configures the `tracing-subscriber` stack for the client core:
//! - JSON, pretty-print, and compact output formats
//! - Module-level filtering through `RUST_LOG` / an explicit filter string
//! - Sensible defaults per build profile (pretty in debug, JSON in release)
//!
//! Credential material never reaches this layer: token types redact
//! themselves in their `Debug` implementations.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Pretty)
//!     .with_filter("core_session=debug,info");
//!
//! init_logging(config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

use crate::error::{Error, Result};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format with colors
    Pretty,
    /// Structured JSON format for machine parsing
    Json,
    /// Compact format for production
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Explicit filter directive (overrides `RUST_LOG` when set)
    pub filter: Option<String>,
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set an explicit filter directive, e.g. `"core_session=debug,info"`.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        match &self.filter {
            Some(directive) => EnvFilter::try_new(directive)
                .map_err(|e| Error::Config(format!("Invalid log filter '{}': {}", directive, e))),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at application start. A second call fails because the global
/// default subscriber is already set.
///
/// # Errors
///
/// Returns `Error::Config` for an invalid filter directive or when a global
/// subscriber has already been installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = config.env_filter()?;

    let registry = tracing_subscriber::registry().with(filter);

    let init_result = match config.format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };

    init_result.map_err(|e| Error::Config(format!("Failed to install subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_filter("core_session=debug");

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter.as_deref(), Some("core_session=debug"));
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = LoggingConfig::default().with_filter("===");
        assert!(config.env_filter().is_err());
    }

    #[test]
    fn test_missing_filter_falls_back_to_info() {
        let config = LoggingConfig::default();
        assert!(config.env_filter().is_ok());
    }
}
