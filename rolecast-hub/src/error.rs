//! Error types for the hub

use thiserror::Error;

/// Errors surfaced to `Hub` callers
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The control loop is gone; the hub cannot recover from this
    #[error("Hub control loop is not running")]
    Fault,
}

/// Per-peer delivery failure; handled inside the hub, never returned to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("outbound queue full ({capacity} frames), peer too slow")]
    Overflow { capacity: usize },

    #[error("outbound queue closed, peer disconnected")]
    Closed,
}

/// Result type for hub operations
pub type Result<T> = std::result::Result<T, HubError>;
