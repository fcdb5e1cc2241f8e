//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the session core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that is implemented differently per platform (desktop,
//! mobile, web).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations against the
//!   platform backend
//! - [`StateStore`](storage::StateStore) - Durable key-value cache for the
//!   credential and identity snapshot
//!
//! ## Failure-mode contract
//!
//! The session core's expiry handling depends on `HttpClient` implementations
//! keeping "a response arrived" (any status, including 401) distinct from "no
//! response at all" (`BridgeError::ConnectionFailed`). See
//! [`http::HttpClient`] for details.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks. Implementations must ensure thread safety.

pub mod error;
pub mod http;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::StateStore;
