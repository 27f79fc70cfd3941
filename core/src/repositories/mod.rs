pub mod token;

pub use token::{InMemoryTokenStore, RotationOutcome, TokenStore};
