//! Domain entities representing token families and refresh tokens.

pub mod family;
pub mod token;

// Re-export commonly used types
pub use family::TokenFamily;
pub use token::{RefreshToken, TokenStatus, DEFAULT_TOKEN_TTL_DAYS};
