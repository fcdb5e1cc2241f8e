//! # Core Configuration Module
//!
//! Provides configuration management for the platform client core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `CoreConfig` instance holding the dependencies and settings the session
//! core needs. It enforces fail-fast validation so a missing bridge surfaces
//! at startup with an actionable message rather than deep inside a request.
//!
//! ## Required Dependencies
//!
//! - `StateStore` - durable cache for the credential and identity snapshot
//! - `HttpClient` - HTTP operations (desktop default: reqwest, injected by
//!   the `desktop-shims` feature when not provided)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://api.example.com/api/")
//!     .state_store(Arc::new(my_state_store))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, StateStore};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Core configuration for the platform client core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the backend API, with a trailing slash
    pub api_base_url: Url,

    /// HTTP client bridge
    pub http_client: Arc<dyn HttpClient>,

    /// Durable state store bridge
    pub state_store: Arc<dyn StateStore>,

    /// Per-request timeout applied by the transport client
    pub request_timeout: Duration,

    /// Event bus buffer size
    pub event_buffer_size: usize,
}

impl CoreConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    state_store: Option<Arc<dyn StateStore>>,
    request_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Set the backend API base URL.
    ///
    /// A trailing slash is appended if missing so endpoint paths join
    /// predictably.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Inject a custom HTTP client bridge.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Inject the durable state store bridge.
    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Override the per-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Override the event bus buffer size.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - `Error::Config` for a missing or unparsable base URL
    /// - `Error::CapabilityMissing` when a required bridge was not provided
    ///   and no platform default exists
    pub fn build(self) -> Result<CoreConfig> {
        let raw_url = self.api_base_url.ok_or_else(|| {
            Error::Config("API base URL is required. Use .api_base_url() to set it.".to_string())
        })?;

        // Normalize to a trailing slash so Url::join keeps the full path.
        let normalized = if raw_url.ends_with('/') {
            raw_url
        } else {
            format!("{}/", raw_url)
        };

        let api_base_url = Url::parse(&normalized)
            .map_err(|e| Error::Config(format!("Invalid API base URL '{}': {}", normalized, e)))?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let state_store = self.state_store.ok_or_else(|| Error::CapabilityMissing {
            capability: "StateStore".to_string(),
            message: "No durable state store provided. \
                      Desktop: inject bridge_desktop::SqliteStateStore. \
                      Other platforms: inject a platform-native adapter."
                .to_string(),
        })?;

        Ok(CoreConfig {
            api_base_url,
            http_client,
            state_store,
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        })
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                  Desktop: enable the desktop-shims feature. \
                  Other platforms: inject a platform-native adapter."
            .to_string(),
    })
}
