//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the platform client core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities other modules depend on. It
//! establishes the logging conventions, event broadcasting mechanism, and
//! bridge-injection configuration used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
