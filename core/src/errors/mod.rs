//! Domain-specific error types and error handling.

mod types;

pub use types::{StoreError, TokenError};

use sv_shared::types::response::ErrorResponse;
use thiserror::Error;

/// Core domain errors
#[derive(Error, Debug)]
pub enum DomainError {
    // Bridge to specific error types
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DomainError {
    /// Stable error code for transport layers
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Token(err) => err.error_code(),
            Self::Store(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Whether the caller may retry the same request.
    ///
    /// Only store-level failures qualify; every token-specific failure is
    /// a final verdict on the presented credential.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

impl From<DomainError> for ErrorResponse {
    fn from(err: DomainError) -> Self {
        ErrorResponse::new(err.error_code(), err.to_string()).with_retryable(err.is_retryable())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
