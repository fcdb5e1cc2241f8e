//! # Session Manager
//!
//! Owns the in-memory session state and the lifecycle operations around it:
//! hydration at startup, login, logout, and identity updates. State changes
//! are announced on the event bus; reads go through [`SessionManager::snapshot`]
//! so callers (and the route guard) always see a consistent point-in-time
//! view.

use std::sync::Arc;

use core_runtime::events::{CoreEvent, EventBus, ProfileEvent, SessionEvent};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SessionError};
use crate::store::SessionStore;
use crate::transport::ApiClient;
use crate::types::{AccessToken, Identity, Role, SessionSnapshot};

struct SessionState {
    identity: Option<Identity>,
    is_loading: bool,
}

/// Session lifecycle coordinator.
pub struct SessionManager {
    api: Arc<ApiClient>,
    store: SessionStore,
    events: EventBus,
    state: RwLock<SessionState>,
}

impl SessionManager {
    /// A fresh manager reports `is_loading` until [`initialize`] completes.
    ///
    /// [`initialize`]: SessionManager::initialize
    pub fn new(api: Arc<ApiClient>, store: SessionStore, events: EventBus) -> Self {
        Self {
            api,
            store,
            events,
            state: RwLock::new(SessionState {
                identity: None,
                is_loading: true,
            }),
        }
    }

    /// Hydrate the session from durable state.
    ///
    /// Purely local: no network traffic, no credential validation. A stale
    /// credential surfaces later through the transport's 401 recovery. Always
    /// ends the loading phase, even when the store misbehaves.
    pub async fn initialize(&self) -> Result<()> {
        let loaded = match self.store.load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "Session hydration failed, starting signed out");
                None
            }
        };

        let mut state = self.state.write().await;
        match loaded {
            Some((_, identity)) => {
                info!(role = %identity.role(), "Session restored from durable state");
                state.identity = Some(identity);
            }
            None => {
                debug!("No persisted session");
                state.identity = None;
            }
        }
        state.is_loading = false;
        Ok(())
    }

    /// Authenticate and establish a session.
    ///
    /// Durable state is written before the in-memory state flips, so a crash
    /// between the two hydrates into the new session rather than losing it.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        let outcome = self.api.login(email, password).await;
        self.complete_login(outcome).await
    }

    /// Establish a session from a Google-issued ID token obtained by the
    /// host's sign-in flow. Persists and announces exactly like
    /// [`login`](SessionManager::login).
    #[instrument(skip(self, id_token))]
    pub async fn login_with_google(&self, id_token: &str) -> Result<Identity> {
        let outcome = self.api.login_with_google(id_token).await;
        self.complete_login(outcome).await
    }

    async fn complete_login(&self, outcome: Result<(AccessToken, Identity)>) -> Result<Identity> {
        let (token, identity) = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                self.events
                    .emit(CoreEvent::Session(SessionEvent::AuthError {
                        message: e.to_string(),
                        recoverable: e.is_recoverable(),
                    }))
                    .ok();
                return Err(e);
            }
        };

        self.store.save(&token, &identity).await?;

        let mut state = self.state.write().await;
        state.identity = Some(identity.clone());
        state.is_loading = false;
        drop(state);

        info!(role = %identity.role(), "Signed in");
        self.events
            .emit(CoreEvent::Session(SessionEvent::SignedIn {
                user_id: identity.user_id().to_string(),
                role: identity.role().as_str().to_string(),
            }))
            .ok();
        Ok(identity)
    }

    /// End the session.
    ///
    /// The server-side invalidation is best effort; local state is cleared
    /// regardless, so logout always leaves the caller signed out. Idempotent.
    pub async fn logout(&self) -> Result<()> {
        let user_id = {
            let state = self.state.read().await;
            state.identity.as_ref().map(|i| i.user_id().to_string())
        };

        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Server-side logout failed, clearing locally");
        }

        self.store.clear().await?;
        let mut state = self.state.write().await;
        state.identity = None;
        drop(state);

        info!("Signed out");
        self.events
            .emit(CoreEvent::Session(SessionEvent::SignedOut { user_id }))
            .ok();
        Ok(())
    }

    /// Replace the identity snapshot after a profile edit.
    ///
    /// The session role is immutable for the lifetime of the session; an
    /// update carrying a different role is rejected outright.
    pub async fn update_identity(&self, identity: Identity) -> Result<()> {
        {
            let state = self.state.read().await;
            if let Some(current) = &state.identity {
                if current.role() != identity.role() {
                    return Err(SessionError::RoleChange {
                        current: current.role().to_string(),
                        proposed: identity.role().to_string(),
                    });
                }
            }
        }

        self.store.save_identity(&identity).await?;
        let mut state = self.state.write().await;
        state.identity = Some(identity.clone());
        drop(state);

        debug!("Identity snapshot replaced");
        self.events
            .emit(CoreEvent::Profile(ProfileEvent::Updated {
                user_id: identity.user_id().to_string(),
                role: identity.role().as_str().to_string(),
            }))
            .ok();
        Ok(())
    }

    /// Re-fetch the profile from the backend and install it as the current
    /// identity.
    pub async fn refresh_profile(&self) -> Result<Identity> {
        let identity = self.api.current_profile().await?;
        self.update_identity(identity.clone()).await?;
        Ok(identity)
    }

    /// Apply a partial profile update for the signed-in role and install the
    /// echoed identity.
    pub async fn update_profile(&self, patch: &Value) -> Result<Identity> {
        let role = {
            let state = self.state.read().await;
            state
                .identity
                .as_ref()
                .map(Identity::role)
                .ok_or(SessionError::SessionExpired)?
        };

        let identity = self.api.update_profile(role, patch).await?;
        self.update_identity(identity.clone()).await?;
        Ok(identity)
    }

    /// Drop in-memory session state without touching the server.
    ///
    /// For hosts reacting to a `SessionExpired` event: the transport already
    /// cleared durable state by then.
    pub async fn clear_local(&self) {
        let mut state = self.state.write().await;
        state.identity = None;
    }

    /// Point-in-time view of the session.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            identity: state.identity.clone(),
            is_loading: state.is_loading,
        }
    }

    /// Convenience: the current role, if signed in.
    pub async fn role(&self) -> Option<Role> {
        self.snapshot().await.role()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish_non_exhaustive()
    }
}
