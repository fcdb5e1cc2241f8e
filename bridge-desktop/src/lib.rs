//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the bridge traits
//! using desktop-appropriate libraries:
//! - `HttpClient` using `reqwest`
//! - `StateStore` using a SQLite-backed key-value store
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteStateStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let state_store = SqliteStateStore::new("/path/to/state.db".into())
//!         .await
//!         .expect("state store");
//!
//!     // Use in core configuration
//! }
//! ```

mod http;
mod state_store;

pub use http::ReqwestHttpClient;
pub use state_store::SqliteStateStore;
