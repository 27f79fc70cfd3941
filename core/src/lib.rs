//! # SessionVault Core
//!
//! Core domain layer for the SessionVault refresh-token engine.
//! This crate contains the token and family entities, the rotation and
//! cleanup services, the token store contract with its in-memory
//! implementation, and the error types shared across the workspace.

pub mod domain;
pub mod errors;
pub mod repositories;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::entities::{RefreshToken, TokenFamily, TokenStatus};
pub use domain::events::ReuseAlert;
pub use errors::{DomainError, DomainResult, StoreError, TokenError};
pub use repositories::token::{InMemoryTokenStore, RotationOutcome, TokenStore};
pub use services::token::{
    CleanupConfig, CleanupResult, CleanupService, ClientMetadata, IssuedToken, RotationConfig,
    RotationService, SecurityAlertSink, TracingAlertSink,
};
