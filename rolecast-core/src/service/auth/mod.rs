pub mod jwt;
pub mod validator;

pub use jwt::{Claims, JwtService};
pub use validator::JwtValidator;

use crate::Result;

/// Validates a signed credential and yields the identity claims it carries
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims>;
}
