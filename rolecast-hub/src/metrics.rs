use serde::Serialize;

use rolecast_core::models::{ConnectionId, ModuleId, RoleSet, UserId};

use crate::connection::Connection;

/// Counters kept by the hub control loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubMetrics {
    pub active_connections: usize,
    pub total_registered: u64,
    /// Prior sessions closed because the same identity registered again
    pub total_replaced: u64,
    /// Sessions dropped after a failed delivery (overflow or closed queue)
    pub total_evicted: u64,
    pub total_broadcasts: u64,
    pub frames_queued: u64,
    pub frames_dropped: u64,
}

/// Point-in-time view of one live connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub connection_id: ConnectionId,
    pub identity: UserId,
    pub module: ModuleId,
    pub roles: RoleSet,
}

impl From<&Connection> for ConnectionSummary {
    fn from(conn: &Connection) -> Self {
        Self {
            connection_id: conn.id().clone(),
            identity: conn.identity().clone(),
            module: conn.module().clone(),
            roles: conn.roles().clone(),
        }
    }
}
