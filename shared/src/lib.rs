//! Shared utilities and common types for the SessionVault server
//!
//! This crate provides functionality used across all server modules:
//! - Configuration types with environment loading
//! - Response structures shared with transport layers

pub mod config;
pub mod types;

// Re-export commonly used items at crate root
pub use config::{AppConfig, DatabaseConfig, TokenConfig};
pub use types::ErrorResponse;
