//! # Session Store
//!
//! Durable persistence for the access credential and the identity snapshot,
//! layered over the injected [`StateStore`] bridge. The pair is the unit of
//! validity: a credential without an identity (or the reverse, or an
//! undecodable snapshot) is self-healed by clearing both and reporting an
//! absent session, never by surfacing the corruption to callers.

use std::sync::Arc;

use bridge_traits::{BridgeError, StateStore};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::types::{AccessToken, Identity};

const KEY_ACCESS_TOKEN: &str = "session.access_token";
const KEY_IDENTITY: &str = "session.identity";

/// Persisted session state. Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn StateStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Persist both halves of a fresh session.
    pub async fn save(&self, token: &AccessToken, identity: &Identity) -> Result<()> {
        self.save_identity(identity).await?;
        self.save_token(token).await?;
        debug!("Session persisted");
        Ok(())
    }

    /// Replace only the credential, e.g. after a silent renewal.
    pub async fn save_token(&self, token: &AccessToken) -> Result<()> {
        self.store
            .set_string(KEY_ACCESS_TOKEN, token.as_str())
            .await
            .map_err(storage_error)
    }

    /// Replace only the identity snapshot, e.g. after a profile update.
    pub async fn save_identity(&self, identity: &Identity) -> Result<()> {
        let encoded = identity.to_value()?.to_string();
        self.store
            .set_string(KEY_IDENTITY, &encoded)
            .await
            .map_err(storage_error)
    }

    /// Load the persisted session, if a valid one exists.
    ///
    /// Half-present or undecodable state is cleared and reported as absent.
    pub async fn load(&self) -> Result<Option<(AccessToken, Identity)>> {
        let token = self
            .store
            .get_string(KEY_ACCESS_TOKEN)
            .await
            .map_err(storage_error)?;
        let raw_identity = self
            .store
            .get_string(KEY_IDENTITY)
            .await
            .map_err(storage_error)?;

        let (token, raw_identity) = match (token, raw_identity) {
            (Some(token), Some(raw)) => (token, raw),
            (None, None) => return Ok(None),
            _ => {
                warn!("Half-present session state, clearing");
                self.clear().await?;
                return Ok(None);
            }
        };

        let identity = serde_json::from_str(&raw_identity)
            .map_err(|e| SessionError::MalformedPayload(e.to_string()))
            .and_then(|value: serde_json::Value| Identity::from_value(&value));

        match identity {
            Ok(identity) => Ok(Some((AccessToken::new(token), identity))),
            Err(e) => {
                warn!(error = %e, "Stored identity undecodable, clearing");
                self.clear().await?;
                Ok(None)
            }
        }
    }

    /// Load only the credential. Request decoration reads this at send time
    /// so a renewal between two requests is always picked up.
    pub async fn load_token(&self) -> Result<Option<AccessToken>> {
        let token = self
            .store
            .get_string(KEY_ACCESS_TOKEN)
            .await
            .map_err(storage_error)?;
        Ok(token.map(AccessToken::new))
    }

    /// Remove both halves. Idempotent.
    pub async fn clear(&self) -> Result<()> {
        self.store
            .delete(KEY_ACCESS_TOKEN)
            .await
            .map_err(storage_error)?;
        self.store.delete(KEY_IDENTITY).await.map_err(storage_error)?;
        debug!("Session cleared");
        Ok(())
    }
}

fn storage_error(e: BridgeError) -> SessionError {
    SessionError::Storage(e.to_string())
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}
