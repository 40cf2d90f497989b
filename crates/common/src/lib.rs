//! SessionVault Common Library
//!
//! Shared code for the SessionVault services including:
//! - Session record entity and repository
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use db::{DbPool, Repository};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
