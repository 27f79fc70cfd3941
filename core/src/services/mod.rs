//! Business services containing the rotation engine and cleanup job.

pub mod token;

// Re-export commonly used types
pub use token::{
    CleanupConfig, CleanupResult, CleanupService, ClientMetadata, IssuedToken, RotationConfig,
    RotationService, SecurityAlertSink, TracingAlertSink,
};
