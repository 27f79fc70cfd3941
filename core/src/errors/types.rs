//! Error types for token rotation and storage operations.
//!
//! Every failure the engine can produce is a variant of one of these
//! closed enums, so callers can handle the full taxonomy exhaustively.
//! String error codes exist only at the response boundary.

use sv_shared::types::response::ErrorResponse;
use thiserror::Error;

/// Token-specific rotation failures
///
/// All four kinds are resolved locally and returned synchronously; none
/// of them is retryable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("Presented token does not match any stored credential")]
    InvalidToken,

    #[error("Token family has been revoked")]
    FamilyRevoked,

    #[error("Token reuse detected; family revoked")]
    ReuseDetected,

    #[error("Token is past its expiry")]
    ExpiredToken,
}

impl TokenError {
    /// Stable error code for transport layers
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "INVALID_TOKEN",
            Self::FamilyRevoked => "FAMILY_REVOKED",
            Self::ReuseDetected => "TOKEN_REUSE_DETECTED",
            Self::ExpiredToken => "EXPIRED_TOKEN",
        }
    }
}

/// Failures raised by a token store implementation
///
/// Each variant surfaces to callers as `STORE_UNAVAILABLE`, the only
/// retryable code: none of them says anything about the validity of the
/// presented token.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Token store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Timed out waiting for the family lock")]
    Contested,

    #[error("Duplicate {what} in token store")]
    Duplicate { what: &'static str },
}

impl From<TokenError> for ErrorResponse {
    fn from(err: TokenError) -> Self {
        ErrorResponse::new(err.error_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_codes() {
        assert_eq!(TokenError::InvalidToken.error_code(), "INVALID_TOKEN");
        assert_eq!(TokenError::FamilyRevoked.error_code(), "FAMILY_REVOKED");
        assert_eq!(TokenError::ReuseDetected.error_code(), "TOKEN_REUSE_DETECTED");
        assert_eq!(TokenError::ExpiredToken.error_code(), "EXPIRED_TOKEN");
    }

    #[test]
    fn test_token_error_response_conversion() {
        let response: ErrorResponse = TokenError::ReuseDetected.into();
        assert_eq!(response.error, "TOKEN_REUSE_DETECTED");
        assert!(response.message.contains("reuse"));
        assert!(!response.retryable);
    }
}
