//! Background heartbeat for realtime connections.
//!
//! Started once during startup, cancelled once during shutdown. The loop only
//! suspends while waiting for the next tick, which is also where cancellation is
//! observed; a sweep is never interrupted halfway.
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::HeartbeatConfig;
use crate::services::realtime::connections::ConnectionManager;

pub struct HeartbeatMonitor {
    connections: ConnectionManager,
    config: HeartbeatConfig,
}

impl HeartbeatMonitor {
    pub fn new(connections: ConnectionManager, config: HeartbeatConfig) -> Self {
        Self {
            connections,
            config,
        }
    }

    /// Spawn the monitor loop on the current runtime.
    pub fn start(self) -> HeartbeatHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.run(token.clone()));

        HeartbeatHandle { token, task }
    }

    async fn run(self, token: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            timeout_secs = self.config.timeout.as_secs(),
            "heartbeat monitor running"
        );

        // First sweep one interval after start, not immediately.
        let mut ticker = time::interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if self.connections.is_empty() {
                        continue;
                    }
                    let report = self.connections.sweep(Instant::now(), self.config.timeout);
                    tracing::debug!(
                        pinged = report.pinged,
                        pruned = report.pruned,
                        open = self.connections.len(),
                        "heartbeat sweep"
                    );
                }
            }
        }

        tracing::info!("heartbeat monitor exited");
    }
}

/// Owner-side handle of the running heartbeat task.
#[derive(Debug)]
pub struct HeartbeatHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Request cooperative cancellation and return without waiting for the task.
    ///
    /// Safe to call on a task that already finished (normally or by panicking).
    pub fn cancel(&self) {
        if self.task.is_finished() {
            tracing::debug!("heartbeat task already finished before cancel");
        }
        self.token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[cfg(test)]
    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for the task to finish. Returns the panic payload if the loop panicked.
    #[cfg(test)]
    pub(crate) async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::services::realtime::connections::Outbound;

    fn config() -> HeartbeatConfig {
        HeartbeatConfig {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn started_monitor_is_running_until_cancelled() {
        let handle = HeartbeatMonitor::new(ConnectionManager::new(), config()).start();
        tokio::task::yield_now().await;

        assert!(handle.is_running());
        assert!(!handle.is_cancelled());

        handle.cancel();
        assert!(handle.is_cancelled());
        handle.join().await.expect("monitor exits cleanly");
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_pings_then_prunes_silent_connections() {
        let connections = ConnectionManager::new();
        let (_, mut rx) = connections.register("alice");
        let handle = HeartbeatMonitor::new(connections.clone(), config()).start();

        // t=1s and t=2s ping, t=3s exceeds the 2s timeout.
        let mut seen = Vec::new();
        while let Some(cmd) = rx.recv().await {
            seen.push(cmd);
        }

        assert_eq!(seen, vec![Outbound::Ping, Outbound::Ping, Outbound::Close]);
        assert!(connections.is_empty());

        handle.cancel();
        handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_waiting_between_sweeps_exits_without_error() {
        let connections = ConnectionManager::new();
        let (_, mut rx) = connections.register("alice");
        let handle = HeartbeatMonitor::new(connections.clone(), config()).start();

        // monitor is now parked on its next tick
        assert_eq!(rx.recv().await, Some(Outbound::Ping));

        handle.cancel();
        handle.join().await.expect("cancellation is not an error");
        // the registry is untouched by cancellation
        assert_eq!(connections.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_registry_is_skipped_until_a_connection_appears() {
        let connections = ConnectionManager::new();
        let handle = HeartbeatMonitor::new(connections.clone(), config()).start();

        // several idle ticks go by without touching the registry
        time::sleep(Duration::from_millis(3500)).await;
        assert!(connections.is_empty());

        let (_, mut rx) = connections.register("bob");
        assert_eq!(rx.recv().await, Some(Outbound::Ping));

        handle.cancel();
        handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_a_finished_task_is_a_noop() {
        let handle = HeartbeatMonitor::new(ConnectionManager::new(), config()).start();
        handle.cancel();
        while handle.is_running() {
            tokio::task::yield_now().await;
        }

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        handle.join().await.unwrap();
    }
}
