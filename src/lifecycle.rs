//! Process lifecycle: startup sequencing and best-effort shutdown.
//!
//! ```text
//! Unstarted → Starting → Running → ShuttingDown → Stopped
//!                 └────→ StartupFailed
//! ```
//!
//! Startup is strictly sequential (config → connect + ping → heartbeat → bind) and
//! nothing is served until every step succeeded. Every resource acquired along the
//! way is registered in a `ShutdownPlan`, which is run exactly once, either at
//! graceful shutdown or when a later startup step fails.
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::error::ServerError;
use crate::services::database::{DISCONNECT_TIMEOUT, DatabaseHandle};
use crate::services::realtime::{ConnectionManager, HeartbeatHandle, HeartbeatMonitor};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unstarted,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
    StartupFailed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unstarted => "unstarted",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
            Self::StartupFailed => "startup_failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal lifecycle transition {from} -> {to}")]
pub struct TransitionError {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Unstarted,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn advance(&mut self, to: LifecycleState) -> Result<(), TransitionError> {
        use LifecycleState::*;

        let allowed = matches!(
            (self.state, to),
            (Unstarted, Starting)
                | (Starting, Running)
                | (Starting, StartupFailed)
                | (Running, ShuttingDown)
                | (ShuttingDown, Stopped)
        );
        if !allowed {
            return Err(TransitionError {
                from: self.state,
                to,
            });
        }

        tracing::info!(from = %self.state, to = %to, "lifecycle state");
        self.state = to;
        Ok(())
    }
}

/// A shutdown step failed. Logged, never propagated.
#[derive(Debug, Error)]
#[error("shutdown step `{step}` failed: {reason}")]
pub struct ShutdownStepError {
    pub step: &'static str,
    pub reason: String,
}

/// One teardown action owned by the shutdown plan.
#[async_trait]
pub trait ShutdownStep: Send {
    fn name(&self) -> &'static str;

    async fn run(self: Box<Self>) -> Result<(), ShutdownStepError>;
}

/// Ordered teardown actions, each attempted regardless of earlier failures.
#[derive(Default)]
pub struct ShutdownPlan {
    steps: Vec<Box<dyn ShutdownStep>>,
}

impl ShutdownPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: impl ShutdownStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order. Failures are logged and returned for inspection.
    pub async fn run(self) -> Vec<ShutdownStepError> {
        let mut failures = Vec::new();

        for step in self.steps {
            let name = step.name();
            match step.run().await {
                Ok(()) => tracing::info!(step = name, "shutdown step done"),
                Err(e) => {
                    tracing::error!(step = name, error = %e, "shutdown step failed");
                    failures.push(e);
                }
            }
        }

        failures
    }
}

/// Closes the MongoDB pool.
pub struct DisconnectDatabase(pub DatabaseHandle);

#[async_trait]
impl ShutdownStep for DisconnectDatabase {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn run(self: Box<Self>) -> Result<(), ShutdownStepError> {
        let DisconnectDatabase(db) = *self;
        db.disconnect(DISCONNECT_TIMEOUT)
            .await
            .map_err(|_| ShutdownStepError {
                step: "database",
                reason: format!("disconnect timed out after {:?}", DISCONNECT_TIMEOUT),
            })?;
        tracing::info!("disconnected from MongoDB");
        Ok(())
    }
}

/// Cancels the heartbeat task. Does not wait for the task to stop.
pub struct CancelHeartbeat(pub HeartbeatHandle);

#[async_trait]
impl ShutdownStep for CancelHeartbeat {
    fn name(&self) -> &'static str {
        "heartbeat"
    }

    async fn run(self: Box<Self>) -> Result<(), ShutdownStepError> {
        let was_running = self.0.is_running();
        self.0.cancel();
        if !self.0.is_cancelled() {
            return Err(ShutdownStepError {
                step: "heartbeat",
                reason: "cancellation was not recorded".into(),
            });
        }
        tracing::info!(was_running, "WebSocket heartbeat monitor stopped");
        Ok(())
    }
}

/// Teardown order for the resources acquired at startup.
///
/// The database closes before the heartbeat is cancelled. The heartbeat loop does
/// not touch the database; if it ever does, swap the two steps.
pub fn resource_plan(db: DatabaseHandle, heartbeat: HeartbeatHandle) -> ShutdownPlan {
    ShutdownPlan::new()
        .step(DisconnectDatabase(db))
        .step(CancelHeartbeat(heartbeat))
}

/// Everything a running server needs: request state plus the plan to tear it down.
pub struct Running {
    pub state: AppState,
    pub shutdown: ShutdownPlan,
}

/// Connect to the database and start the heartbeat, in that order.
///
/// A failed connect leaves nothing behind (the driver client is closed inside
/// `DatabaseHandle::connect`).
pub async fn startup(config: &Config) -> Result<Running, ServerError> {
    tracing::info!(database = %config.database_name, "connecting to MongoDB");
    let db = DatabaseHandle::connect(&config.mongodb_uri, &config.database_name).await?;
    tracing::info!(database = db.name(), "MongoDB connection successful");

    let connections = ConnectionManager::new();
    let heartbeat = HeartbeatMonitor::new(connections.clone(), config.heartbeat).start();
    tracing::info!("WebSocket heartbeat monitor started");

    let state = AppState::new(db.database(), connections);

    Ok(Running {
        state,
        shutdown: resource_plan(db, heartbeat),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::HeartbeatConfig;

    #[test]
    fn lifecycle_follows_the_happy_path() {
        let mut lifecycle = Lifecycle::new();
        for next in [
            LifecycleState::Starting,
            LifecycleState::Running,
            LifecycleState::ShuttingDown,
            LifecycleState::Stopped,
        ] {
            lifecycle.advance(next).unwrap();
        }
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn startup_failure_is_terminal() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(LifecycleState::Starting).unwrap();
        lifecycle.advance(LifecycleState::StartupFailed).unwrap();

        let err = lifecycle.advance(LifecycleState::Running).unwrap_err();
        assert_eq!(
            err,
            TransitionError {
                from: LifecycleState::StartupFailed,
                to: LifecycleState::Running,
            }
        );
    }

    #[test]
    fn running_requires_starting_first() {
        let mut lifecycle = Lifecycle::new();
        assert!(lifecycle.advance(LifecycleState::Running).is_err());
        assert_eq!(lifecycle.state(), LifecycleState::Unstarted);
    }

    struct Recorded {
        name: &'static str,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl ShutdownStep for Recorded {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(self: Box<Self>) -> Result<(), ShutdownStepError> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(ShutdownStepError {
                    step: self.name,
                    reason: "boom".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn every_step_runs_in_order_even_after_a_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let plan = ShutdownPlan::new()
            .step(Recorded {
                name: "database",
                fail: true,
                log: log.clone(),
            })
            .step(Recorded {
                name: "heartbeat",
                fail: false,
                log: log.clone(),
            });

        let failures = plan.run().await;

        assert_eq!(*log.lock().unwrap(), vec!["database", "heartbeat"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].step, "database");
    }

    #[tokio::test]
    async fn resource_plan_closes_database_then_cancels_heartbeat() {
        let db = DatabaseHandle::unchecked("mongodb://127.0.0.1:1", "immigrant_job_finder").await;
        let heartbeat =
            HeartbeatMonitor::new(ConnectionManager::new(), HeartbeatConfig::default()).start();
        let token = heartbeat.cancellation_token();

        let plan = resource_plan(db, heartbeat);
        assert_eq!(plan.step_names(), vec!["database", "heartbeat"]);

        let failures = plan.run().await;
        assert!(failures.is_empty(), "{failures:?}");
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn unreachable_database_aborts_startup() {
        let vars: HashMap<&str, &str> = HashMap::from([(
            "MONGODB_URI",
            "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200",
        )]);
        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        let err = startup(&config).await.err().expect("startup must fail");
        assert!(matches!(err, ServerError::DatabaseUnavailable(_)), "{err:?}");
    }
}
