//! Registry of open realtime (WebSocket) connections.
//!
//! The registry does not know about frames: it hands each connection a channel of
//! `Outbound` commands and the socket task translates them. This keeps the heartbeat
//! sweep testable without a live socket.
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use uuid::Uuid;

/// Commands queued from the server side to a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outbound {
    Ping,
    Close,
}

// Pings are idempotent, a tiny buffer is enough.
const OUTBOUND_BUFFER: usize = 8;

pub type ConnectionId = Uuid;

#[derive(Debug)]
struct Connection {
    user_id: String,
    last_seen: Instant,
    outbound: mpsc::Sender<Outbound>,
}

/// Outcome of one liveness sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub pinged: usize,
    pub pruned: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ConnectionManager {
    inner: Arc<DashMap<ConnectionId, Connection>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: impl Into<String>) -> (ConnectionId, mpsc::Receiver<Outbound>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let user_id = user_id.into();

        tracing::debug!(connection_id = %id, user_id = %user_id, "realtime connection registered");
        self.inner.insert(
            id,
            Connection {
                user_id,
                last_seen: Instant::now(),
                outbound: tx,
            },
        );

        (id, rx)
    }

    pub fn unregister(&self, id: &ConnectionId) -> bool {
        match self.inner.remove(id) {
            Some((_, conn)) => {
                tracing::debug!(connection_id = %id, user_id = %conn.user_id, "realtime connection removed");
                true
            }
            None => false,
        }
    }

    /// Record activity (pong or any inbound frame).
    pub fn touch(&self, id: &ConnectionId) {
        if let Some(mut conn) = self.inner.get_mut(id) {
            conn.last_seen = Instant::now();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn connections_for(&self, user_id: &str) -> usize {
        self.inner.iter().filter(|c| c.user_id == user_id).count()
    }

    /// Prune connections silent for longer than `timeout` and ping the rest.
    ///
    /// A connection whose receiving side is gone is pruned as well. A full outbound
    /// buffer only skips this round's ping.
    pub fn sweep(&self, now: Instant, timeout: Duration) -> SweepReport {
        let mut report = SweepReport::default();
        let mut dead = Vec::new();

        // Collect first: removing while iterating a DashMap shard deadlocks.
        for entry in self.inner.iter() {
            let conn = entry.value();
            if now.saturating_duration_since(conn.last_seen) > timeout {
                dead.push(*entry.key());
                continue;
            }
            match conn.outbound.try_send(Outbound::Ping) {
                Ok(()) => report.pinged += 1,
                Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => dead.push(*entry.key()),
            }
        }

        for id in dead {
            if let Some((_, conn)) = self.inner.remove(&id) {
                let _ = conn.outbound.try_send(Outbound::Close);
                tracing::info!(connection_id = %id, user_id = %conn.user_id, "pruned dead realtime connection");
                report.pruned += 1;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn live_connections_are_pinged() {
        let manager = ConnectionManager::new();
        let (_, mut rx) = manager.register("alice");

        let report = manager.sweep(Instant::now(), TIMEOUT);

        assert_eq!(report, SweepReport { pinged: 1, pruned: 0 });
        assert_eq!(rx.recv().await, Some(Outbound::Ping));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_connections_are_closed_and_pruned() {
        let manager = ConnectionManager::new();
        let (_, mut stale) = manager.register("alice");
        tokio::time::advance(Duration::from_secs(45)).await;
        let (_, mut fresh) = manager.register("bob");
        tokio::time::advance(Duration::from_secs(30)).await;

        let report = manager.sweep(Instant::now(), TIMEOUT);

        assert_eq!(report, SweepReport { pinged: 1, pruned: 1 });
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.connections_for("bob"), 1);
        assert_eq!(stale.recv().await, Some(Outbound::Close));
        // sender dropped with the registry entry
        assert_eq!(stale.recv().await, None);
        assert_eq!(fresh.recv().await, Some(Outbound::Ping));
    }

    #[tokio::test(start_paused = true)]
    async fn touch_keeps_a_connection_alive() {
        let manager = ConnectionManager::new();
        let (id, _rx) = manager.register("alice");

        tokio::time::advance(Duration::from_secs(50)).await;
        manager.touch(&id);
        tokio::time::advance(Duration::from_secs(50)).await;

        let report = manager.sweep(Instant::now(), TIMEOUT);
        assert_eq!(report.pruned, 0);
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned() {
        let manager = ConnectionManager::new();
        let (_, rx) = manager.register("alice");
        drop(rx);

        let report = manager.sweep(Instant::now(), TIMEOUT);

        assert_eq!(report, SweepReport { pinged: 0, pruned: 1 });
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn full_buffer_skips_the_ping_but_keeps_the_connection() {
        let manager = ConnectionManager::new();
        let (_, _rx) = manager.register("alice");

        for _ in 0..OUTBOUND_BUFFER {
            manager.sweep(Instant::now(), TIMEOUT);
        }
        let report = manager.sweep(Instant::now(), TIMEOUT);

        assert_eq!(report, SweepReport { pinged: 0, pruned: 0 });
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn unregister_is_reported_once() {
        let manager = ConnectionManager::new();
        let (id, _rx) = manager.register("alice");

        assert!(manager.unregister(&id));
        assert!(!manager.unregister(&id));
    }
}
