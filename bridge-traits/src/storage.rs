//! Durable State Storage
//!
//! A thin key-value cache that survives application restarts. The session
//! core uses it to persist the current credential and identity snapshot.
//! No cryptography happens at this layer; values are opaque strings.

use async_trait::async_trait;

use crate::error::Result;

/// Durable key-value storage trait
///
/// Abstracts platform-specific persistent storage:
/// - Desktop: SQLite-backed store in the app data directory
/// - Mobile: SharedPreferences / UserDefaults
/// - Web: localStorage
///
/// Implementations must make `delete` and `clear_all` idempotent: removing a
/// key that does not exist is a success.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::StateStore;
///
/// async fn remember(store: &dyn StateStore) -> Result<()> {
///     store.set_string("session.access_token", "tok").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Store a string value, overwriting any previous value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Delete a key
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists without retrieving it
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// List all stored keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Remove every stored key
    async fn clear_all(&self) -> Result<()>;
}
