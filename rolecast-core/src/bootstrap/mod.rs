//! Bootstrap helpers for the rolecast server
//!
//! - Configuration loading
//! - Profile store seeding

pub mod config;
pub mod profiles;

pub use config::{load_config, load_config_from};
pub use profiles::bootstrap_profiles;
