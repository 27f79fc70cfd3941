pub mod r#trait {
    pub use super::trait_::*;
}
#[path = "trait.rs"]
mod trait_;
pub mod memory;

pub use memory::InMemoryTokenStore;
pub use r#trait::{RotationOutcome, TokenStore};

#[cfg(test)]
mod tests;
