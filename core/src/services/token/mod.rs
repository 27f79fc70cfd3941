//! Token service module for refresh token management
//!
//! This module handles all token-related operations:
//! - Issuing the initial token of a (user, device) family
//! - Rotating a presented token to its successor
//! - Reuse detection with family-wide cascade revocation
//! - Security alerting through a pluggable sink
//! - Background cleanup of expired tokens and empty families

mod alerts;
mod cleanup;
mod config;
mod service;

#[cfg(test)]
mod tests;

pub use alerts::{SecurityAlertSink, TracingAlertSink};
pub use cleanup::{CleanupConfig, CleanupResult, CleanupService};
pub use config::RotationConfig;
pub use service::{hash_token, ClientMetadata, IssuedToken, RotationService};
