/*
 * Responsibility
 * - Tracing / panic hook setup
 * - Config -> lifecycle startup -> Router -> bind -> serve -> shutdown
 * - Everything up to bind happens before Running; a failure there tears down
 *   whatever was already acquired
 * - Middleware is applied here (HTTP layers, CORS)
 */
use std::net::SocketAddr;
use std::{panic, process};

use axum::Router;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::error::ServerError;
use crate::lifecycle::{self, Lifecycle, LifecycleState, Running, ShutdownPlan};
use crate::middleware;
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,job_finder_api=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr can be hidden depending on how the process is launched
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<(), ServerError> {
    init_tracing();

    let mut lifecycle = Lifecycle::new();
    lifecycle.advance(LifecycleState::Starting)?;

    let Started {
        addr,
        listener,
        app,
        shutdown,
    } = match start().await {
        Ok(started) => started,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            lifecycle.advance(LifecycleState::StartupFailed)?;
            return Err(e);
        }
    };
    lifecycle.advance(LifecycleState::Running)?;

    tracing::info!(addr = %addr, "listening");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    lifecycle.advance(LifecycleState::ShuttingDown)?;
    tracing::info!(steps = ?shutdown.step_names(), "running shutdown plan");
    let failures = shutdown.run().await;
    lifecycle.advance(LifecycleState::Stopped)?;
    tracing::info!(state = %lifecycle.state(), failed_steps = failures.len(), "shutdown complete");

    served.map_err(ServerError::Serve)
}

/// A fully started server that has not accepted any connection yet.
struct Started {
    addr: SocketAddr,
    listener: TcpListener,
    app: Router,
    shutdown: ShutdownPlan,
}

/// Every step up to (and including) binding the listener.
///
/// The router is built before binding so that nothing after the database and
/// heartbeat come up can fail without going through the shutdown plan.
async fn start() -> Result<Started, ServerError> {
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let Running { state, shutdown } = lifecycle::startup(&config).await?;
    let app = build_router(state, &config);
    let (listener, shutdown) = bind_or_teardown(config.addr, shutdown).await?;

    Ok(Started {
        addr: config.addr,
        listener,
        app,
        shutdown,
    })
}

/// Bind the listener, or run the shutdown plan and report the bind failure.
async fn bind_or_teardown(
    addr: SocketAddr,
    shutdown: ShutdownPlan,
) -> Result<(TcpListener, ShutdownPlan), ServerError> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok((listener, shutdown)),
        Err(source) => {
            tracing::error!(addr = %addr, error = %source, "bind failed, releasing resources");
            let failures = shutdown.run().await;
            tracing::info!(failed_steps = failures.len(), "startup teardown complete");
            Err(ServerError::Bind { addr, source })
        }
    }
}

fn build_router(state: AppState, config: &Config) -> Router {
    for feature in api::FEATURES.iter() {
        tracing::info!(prefix = feature.prefix, tag = feature.tag, "router mounted");
    }

    let router = api::routes().with_state(state);
    let router = middleware::http::apply(router, &config.http);
    middleware::cors::apply(router, config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
