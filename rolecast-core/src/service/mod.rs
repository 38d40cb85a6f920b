pub mod auth;
pub mod profile;

pub use auth::{Claims, JwtService, JwtValidator, TokenVerifier};
pub use profile::{InMemoryProfileStore, ProfileResolver};
