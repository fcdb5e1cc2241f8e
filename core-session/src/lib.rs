//! # Core Session Module
//!
//! The client session and authorization core for the multi-role healthcare
//! platform: who is signed in, how their credential travels with API
//! requests, and what they may see.
//!
//! ## Components
//!
//! - [`store::SessionStore`] - durable persistence of the credential and
//!   identity pair, with self-healing on corruption
//! - [`transport::ApiClient`] - bearer decoration at send time, single
//!   silent renewal on 401 with exactly one replay
//! - [`manager::SessionManager`] - session lifecycle (hydrate, login,
//!   logout, identity updates) and snapshots
//! - [`guard`] - pure per-navigation authorization decisions
//! - [`projection`] - the shared role resolver and display projection
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_session::SessionCore;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://api.example.com/api/")
//!     .state_store(Arc::new(my_state_store))
//!     .build()?;
//!
//! let core = SessionCore::new(config);
//! core.manager.initialize().await?;
//!
//! let snapshot = core.manager.snapshot().await;
//! ```

pub mod error;
pub mod guard;
pub mod manager;
pub mod projection;
pub mod store;
pub mod transport;
pub mod types;

pub use error::{Result, SessionError};
pub use guard::{evaluate, RouteDecision};
pub use manager::SessionManager;
pub use projection::{display_role, resolve_role, FieldRow, ProfileView};
pub use store::SessionStore;
pub use transport::ApiClient;
pub use types::{AccessToken, Identity, Role, SessionSnapshot};

use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use std::sync::Arc;

/// Assembled session core: store, transport, manager, and event bus wired
/// from one [`CoreConfig`].
pub struct SessionCore {
    pub events: EventBus,
    pub api: Arc<ApiClient>,
    pub manager: Arc<SessionManager>,
}

impl SessionCore {
    pub fn new(config: CoreConfig) -> Self {
        let events = EventBus::new(config.event_buffer_size);
        let store = SessionStore::new(config.state_store.clone());
        let api = Arc::new(ApiClient::new(&config, store.clone(), events.clone()));
        let manager = Arc::new(SessionManager::new(
            api.clone(),
            store,
            events.clone(),
        ));
        Self { events, api, manager }
    }
}

impl std::fmt::Debug for SessionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCore")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
