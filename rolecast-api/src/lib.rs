//! HTTP surface of the rolecast hub
//!
//! WebSocket handshake, health checks and error mapping.

pub mod http;

pub use http::{create_router, AppState};
