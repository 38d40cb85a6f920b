use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors that must end a handshake with a bare "unauthorized"
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::ProfileNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
