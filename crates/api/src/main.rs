// API server clippy configuration
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Billgate API Server
//!
//! HTTP surface of the multi-tenant billing gateway: project-key
//! authenticated tenant routes, the signature-authenticated Stripe
//! webhook receiver, and admin/observability endpoints.

mod auth;
mod config;
mod error;
mod routes;
mod security;
mod state;

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::time::Duration;

use axum::middleware;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use billgate_shared::{create_pool, run_migrations};

use crate::config::Config;
use crate::routes::create_router;
use crate::security::security_headers_middleware;
use crate::state::AppState;

/// Seconds between rate limiter window sweeps.
const RATE_LIMIT_CLEANUP_SECS: u64 = 300;

/// How long in-flight requests get to drain after a shutdown signal
/// before the process forces termination.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(log_filter(
            std::env::var("RUST_LOG").ok(),
            std::env::var("LOG_LEVEL").ok(),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Billgate API Server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    tracing::info!(
        environment = config.environment.as_str(),
        port = config.http_port,
        "Configuration loaded"
    );

    tracing::info!("Connecting to database...");
    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let state = AppState::new(pool, config.clone());

    // Sweep expired rate limit windows so idle projects do not pin memory
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
        loop {
            interval.tick().await;
            limiter.cleanup().await;
        }
    });

    // Per-zone timeouts live inside the router; the security headers
    // middleware sits outside them so timeout-synthesized responses
    // still carry the headers.
    let app = create_router(state)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    match drain_or_force(server.into_future(), shutdown_rx, SHUTDOWN_GRACE).await {
        Some(result) => result?,
        None => tracing::warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "In-flight requests did not drain within the grace period, forcing exit"
        ),
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Build the tracing filter. `RUST_LOG` takes precedence, then
/// `LOG_LEVEL`, then the built-in default.
fn log_filter(
    rust_log: Option<String>,
    log_level: Option<String>,
) -> tracing_subscriber::EnvFilter {
    let directives = rust_log
        .or(log_level)
        .unwrap_or_else(|| "info,billgate_api=debug".into());
    tracing_subscriber::EnvFilter::new(directives)
}

/// Run the server future to completion, but once shutdown has begun,
/// give it at most `grace` to drain before giving up. Returns `None`
/// when the grace period expired with requests still in flight.
async fn drain_or_force<F: Future>(
    server: F,
    shutdown_started: tokio::sync::oneshot::Receiver<()>,
    grace: Duration,
) -> Option<F::Output> {
    tokio::pin!(server);
    tokio::select! {
        result = &mut server => Some(result),
        _ = async {
            let _ = shutdown_started.await;
            tokio::time::sleep(grace).await;
        } => None,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_used_when_rust_log_absent() {
        let filter = log_filter(None, Some("warn".to_string()));
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn rust_log_takes_precedence_over_log_level() {
        let filter = log_filter(Some("debug".to_string()), Some("warn".to_string()));
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn default_filter_when_neither_is_set() {
        let filter = log_filter(None, None).to_string();
        assert!(filter.contains("info"));
        assert!(filter.contains("billgate_api=debug"));
    }

    #[tokio::test]
    async fn drain_returns_server_result_when_it_finishes() {
        let (_tx, rx) = tokio::sync::oneshot::channel::<()>();
        let outcome = drain_or_force(async { 7 }, rx, Duration::from_secs(30)).await;
        assert_eq!(outcome, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn drain_forces_exit_after_grace_period() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tx.send(()).unwrap();

        let stuck = std::future::pending::<()>();
        let outcome = drain_or_force(stuck, rx, Duration::from_secs(30)).await;
        assert_eq!(outcome, None);
    }

    #[tokio::test(start_paused = true)]
    async fn grace_timer_starts_only_after_shutdown_begins() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let server = async {
            tokio::time::sleep(Duration::from_secs(120)).await;
            42
        };
        // Shutdown never begins, so even a slow server runs to the end.
        let outcome = drain_or_force(server, rx, Duration::from_secs(30)).await;
        drop(tx);
        assert_eq!(outcome, Some(42));
    }
}
