//! Hub control loop
//!
//! One spawned task owns the set of live connections. [`Hub`] handles are
//! cheap clones that talk to it over a single FIFO command channel, so
//! registrations, removals and broadcasts apply in the order they were
//! submitted. The loop never awaits a peer: frames are handed to each
//! connection's bounded queue with `try_send`.

use std::sync::Arc;

use indexmap::IndexMap;
use rolecast_core::models::{ModuleId, UserId};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::connection::{Connection, Frame};
use crate::error::{HubError, Result};
use crate::metrics::{ConnectionSummary, HubMetrics};
use crate::targeting::Targeting;

enum HubCommand {
    Register(Arc<Connection>),
    Unregister(Arc<Connection>),
    Broadcast {
        frame: Frame,
        targeting: Targeting,
        reply: oneshot::Sender<usize>,
    },
    Snapshot(oneshot::Sender<Vec<ConnectionSummary>>),
    Metrics(oneshot::Sender<HubMetrics>),
}

/// Handle to the hub control loop
#[derive(Debug, Clone)]
pub struct Hub {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl Hub {
    /// Start the control loop on the current tokio runtime
    ///
    /// The loop runs until every handle is dropped, then closes all
    /// connections still registered.
    #[must_use]
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Registry::default().run(rx));
        Self { tx }
    }

    /// Add a connection to the live set
    ///
    /// A live connection with the same identity is closed and replaced.
    pub fn register(&self, conn: Arc<Connection>) {
        if self.tx.send(HubCommand::Register(conn)).is_err() {
            warn!("Hub control loop is not running, registration dropped");
        }
    }

    /// Remove a connection and close it
    ///
    /// Idempotent. The entry is only removed if it is this exact session, so
    /// a late call from a replaced session leaves its successor in place.
    pub fn unregister(&self, conn: &Arc<Connection>) {
        conn.close();
        if self.tx.send(HubCommand::Unregister(Arc::clone(conn))).is_err() {
            debug!(
                connection_id = %conn.id(),
                "Hub control loop is not running, unregister skipped"
            );
        }
    }

    /// Serialize `message` once and queue it for every live connection whose
    /// roles intersect `roles` and whose module is in `modules`
    ///
    /// Returns how many connections the frame was queued for. Peers that
    /// cannot take the frame are evicted inside the hub and do not fail the
    /// call.
    pub async fn broadcast<T, R, M>(&self, message: &T, roles: R, modules: M) -> Result<usize>
    where
        T: Serialize + ?Sized,
        R: IntoIterator,
        R::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<ModuleId>,
    {
        self.broadcast_to(message, Targeting::new(roles, modules))
            .await
    }

    pub async fn broadcast_to<T>(&self, message: &T, targeting: Targeting) -> Result<usize>
    where
        T: Serialize + ?Sized,
    {
        let frame = Frame::from(serde_json::to_string(message)?);
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Broadcast {
            frame,
            targeting,
            reply,
        })?;
        rx.await.map_err(|_| HubError::Fault)
    }

    pub async fn connection_count(&self) -> Result<usize> {
        Ok(self.metrics().await?.active_connections)
    }

    pub async fn snapshot(&self) -> Result<Vec<ConnectionSummary>> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Snapshot(reply))?;
        rx.await.map_err(|_| HubError::Fault)
    }

    pub async fn metrics(&self) -> Result<HubMetrics> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Metrics(reply))?;
        rx.await.map_err(|_| HubError::Fault)
    }

    fn send(&self, command: HubCommand) -> Result<()> {
        self.tx.send(command).map_err(|_| HubError::Fault)
    }
}

#[derive(Default)]
struct Registry {
    live: IndexMap<UserId, Arc<Connection>>,
    metrics: HubMetrics,
}

impl Registry {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<HubCommand>) {
        debug!("Hub control loop started");

        while let Some(command) = rx.recv().await {
            match command {
                HubCommand::Register(conn) => self.register(conn),
                HubCommand::Unregister(conn) => self.unregister(&conn),
                HubCommand::Broadcast {
                    frame,
                    targeting,
                    reply,
                } => {
                    let delivered = self.broadcast(&frame, &targeting);
                    // caller may have given up waiting
                    let _ = reply.send(delivered);
                }
                HubCommand::Snapshot(reply) => {
                    let summaries = self
                        .live
                        .values()
                        .map(|conn| ConnectionSummary::from(conn.as_ref()))
                        .collect();
                    let _ = reply.send(summaries);
                }
                HubCommand::Metrics(reply) => {
                    let _ = reply.send(self.snapshot_metrics());
                }
            }
        }

        for conn in self.live.values() {
            conn.close();
        }
        info!(
            closed = self.live.len(),
            "Hub control loop stopped, remaining connections closed"
        );
    }

    fn register(&mut self, conn: Arc<Connection>) {
        if conn.is_closed() {
            debug!(
                connection_id = %conn.id(),
                user_id = %conn.identity(),
                "Connection closed before registration, ignoring"
            );
            return;
        }

        let identity = conn.identity().clone();
        let connection_id = conn.id().clone();
        let module = conn.module().clone();

        if let Some(previous) = self.live.insert(identity.clone(), conn) {
            if previous.id() == &connection_id {
                debug!(connection_id = %connection_id, "Connection already registered");
                return;
            }
            previous.close();
            self.metrics.total_replaced += 1;
            info!(
                user_id = %identity,
                connection_id = %previous.id(),
                replaced_by = %connection_id,
                "Duplicate identity, closed previous connection"
            );
        }

        self.metrics.total_registered += 1;
        info!(
            user_id = %identity,
            connection_id = %connection_id,
            module = %module,
            active = self.live.len(),
            "Connection registered"
        );
    }

    fn unregister(&mut self, conn: &Arc<Connection>) {
        conn.close();

        let is_current = self
            .live
            .get(conn.identity())
            .is_some_and(|live| live.id() == conn.id());

        if is_current {
            self.live.swap_remove(conn.identity());
            info!(
                user_id = %conn.identity(),
                connection_id = %conn.id(),
                active = self.live.len(),
                "Connection unregistered"
            );
        } else {
            debug!(
                user_id = %conn.identity(),
                connection_id = %conn.id(),
                "Unregister for a connection that is not live"
            );
        }
    }

    fn broadcast(&mut self, frame: &Frame, targeting: &Targeting) -> usize {
        self.metrics.total_broadcasts += 1;
        if targeting.is_empty() {
            debug!("Broadcast with empty targeting, nothing to deliver");
            return 0;
        }

        let mut delivered = 0;
        let mut failed: Vec<UserId> = Vec::new();

        for conn in self.live.values() {
            if !conn.matches(targeting) {
                continue;
            }
            match conn.try_enqueue(Frame::clone(frame)) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(
                        user_id = %conn.identity(),
                        connection_id = %conn.id(),
                        module = %conn.module(),
                        error = %err,
                        "Failed to queue frame, evicting connection"
                    );
                    failed.push(conn.identity().clone());
                }
            }
        }

        for identity in &failed {
            if let Some(conn) = self.live.swap_remove(identity) {
                conn.close();
            }
        }

        self.metrics.frames_queued += delivered as u64;
        self.metrics.frames_dropped += failed.len() as u64;
        self.metrics.total_evicted += failed.len() as u64;

        debug!(
            delivered,
            evicted = failed.len(),
            "Broadcast complete"
        );
        delivered
    }

    fn snapshot_metrics(&self) -> HubMetrics {
        HubMetrics {
            active_connections: self.live.len(),
            ..self.metrics
        }
    }
}
