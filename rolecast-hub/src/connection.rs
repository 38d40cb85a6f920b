//! One authenticated peer session
//!
//! A [`Connection`] carries the tags fixed at handshake (identity, role set,
//! module) and the producer side of a bounded outbound queue. The consumer
//! side, [`OutboundQueue`], belongs to the connection's writer task.

use std::sync::Arc;

use rolecast_core::models::{ConnectionId, ModuleId, RoleSet, UserId};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::DeliveryError;
use crate::targeting::Targeting;

/// A serialized message, shared by every recipient of one broadcast
pub type Frame = Arc<str>;

/// Live session tracked by the hub
///
/// All fields are fixed at construction, so the hub and the session's own
/// tasks read them without synchronization.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    identity: UserId,
    roles: RoleSet,
    module: ModuleId,
    capacity: usize,
    outbound: mpsc::Sender<Frame>,
    shutdown: CancellationToken,
}

impl Connection {
    /// Create a connection and the queue its writer drains
    ///
    /// `capacity` is clamped to at least one frame.
    #[must_use]
    pub fn new(
        identity: UserId,
        roles: RoleSet,
        module: ModuleId,
        capacity: usize,
    ) -> (Arc<Self>, OutboundQueue) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let shutdown = CancellationToken::new();

        let connection = Arc::new(Self {
            id: ConnectionId::new(),
            identity,
            roles,
            module,
            capacity,
            outbound: tx,
            shutdown: shutdown.clone(),
        });

        (connection, OutboundQueue { rx, shutdown })
    }

    #[must_use]
    pub const fn id(&self) -> &ConnectionId {
        &self.id
    }

    #[must_use]
    pub const fn identity(&self) -> &UserId {
        &self.identity
    }

    #[must_use]
    pub const fn roles(&self) -> &RoleSet {
        &self.roles
    }

    #[must_use]
    pub const fn module(&self) -> &ModuleId {
        &self.module
    }

    #[must_use]
    pub fn matches(&self, targeting: &Targeting) -> bool {
        targeting.matches(&self.roles, &self.module)
    }

    /// Queue a frame without waiting
    ///
    /// A full queue is reported as [`DeliveryError::Overflow`]; the frame is
    /// dropped and the caller decides what happens to the peer.
    pub fn try_enqueue(&self, frame: Frame) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Overflow {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Stop the session; safe to call any number of times
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.outbound.is_closed()
    }

    /// Resolves once [`Connection::close`] has been called
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.shutdown.cancelled()
    }
}

/// Consumer side of a connection's outbound queue
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<Frame>,
    shutdown: CancellationToken,
}

impl OutboundQueue {
    /// Next frame in enqueue order
    ///
    /// Returns `None` once the connection is closed; frames still buffered at
    /// that point are discarded.
    pub async fn next(&mut self) -> Option<Frame> {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => None,
            frame = self.rx.recv() => frame,
        }
    }

    /// Non-blocking variant of [`OutboundQueue::next`]
    pub fn try_next(&mut self) -> Option<Frame> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn connection(capacity: usize) -> (Arc<Connection>, OutboundQueue) {
        Connection::new(
            UserId::from("u1"),
            ["admin"].into_iter().collect(),
            ModuleId::from("1"),
            capacity,
        )
    }

    #[tokio::test]
    async fn test_frames_arrive_in_enqueue_order() {
        let (conn, mut queue) = connection(8);

        for i in 0..5 {
            conn.try_enqueue(Frame::from(format!("frame-{i}"))).unwrap();
        }

        for i in 0..5 {
            assert_eq!(&*queue.next().await.unwrap(), format!("frame-{i}"));
        }
        assert!(queue.try_next().is_none());
    }

    #[tokio::test]
    async fn test_full_queue_reports_overflow() {
        let (conn, _queue) = connection(2);

        conn.try_enqueue(Frame::from("a")).unwrap();
        conn.try_enqueue(Frame::from("b")).unwrap();

        let err = conn.try_enqueue(Frame::from("c")).unwrap_err();
        assert_eq!(err, DeliveryError::Overflow { capacity: 2 });
    }

    #[tokio::test]
    async fn test_dropped_queue_reports_closed() {
        let (conn, queue) = connection(2);
        drop(queue);

        assert!(conn.is_closed());
        assert_eq!(conn.try_enqueue(Frame::from("a")).unwrap_err(), DeliveryError::Closed);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_discards_backlog() {
        let (conn, mut queue) = connection(4);
        conn.try_enqueue(Frame::from("pending")).unwrap();

        conn.close();
        conn.close();

        assert!(conn.is_closed());
        assert!(queue.next().await.is_none());
        assert_eq!(conn.try_enqueue(Frame::from("late")).unwrap_err(), DeliveryError::Closed);
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_writer() {
        let (conn, mut queue) = connection(4);

        let writer = tokio::spawn(async move { queue.next().await });
        tokio::task::yield_now().await;
        conn.close();

        let result = tokio::time::timeout(Duration::from_millis(100), writer)
            .await
            .expect("writer did not observe close")
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_closed_future_resolves() {
        let (conn, _queue) = connection(1);
        let waiter = conn.clone();

        let handle = tokio::spawn(async move { waiter.closed().await });
        conn.close();

        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("closed() did not resolve")
            .unwrap();
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let (conn, _queue) = connection(0);
        conn.try_enqueue(Frame::from("a")).unwrap();
        assert!(conn.try_enqueue(Frame::from("b")).is_err());
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        let (a, _qa) = connection(1);
        let (b, _qb) = connection(1);

        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.id(), b.id());
    }
}
