//! Dicerelay HTTP Surface
//!
//! HTTP layer built with Axum. The routes are thin glue around the
//! connection hub.
//!
//! # Endpoints
//!
//! - `GET /` - Static client page
//! - `GET /favicon.ico` - Empty response
//! - `GET /health` - Liveness probe (`ok`)
//! - `GET /stats` - Hub counters and uptime
//! - `GET /ws` - WebSocket relay connection
//!
//! # Example
//!
//! ```rust,ignore
//! use dicerelay::api::{serve, AppState};
//! use dicerelay::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let state = AppState::new(config.clone())?;
//!     serve(state, &config.server).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::websocket::websocket_handler;

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/", get(routes::page::index))
        .route("/favicon.ico", get(routes::page::favicon))
        .route("/health", get(routes::health::health))
        .route("/stats", get(routes::health::stats))
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the server and run until a shutdown signal arrives
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<(), ApiError> {
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Dicerelay listening on {}", addr);

    serve_with_shutdown(listener, state, shutdown_signal()).await
}

/// Serve on `listener` until `signal` resolves.
///
/// On shutdown the hub closes every outbound queue, then this waits (bounded
/// by twice the write timeout) for each connection's writer to send its
/// close frame before returning.
pub async fn serve_with_shutdown<F>(
    listener: tokio::net::TcpListener,
    state: AppState,
    signal: F,
) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let hub = state.hub.clone();
    let connections = state.connections.clone();
    let drain_timeout = state.config.hub.connection_settings().write_timeout * 2;
    let router = build_router(state);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        signal.await;
        hub.shutdown().await;
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    // Upgraded sockets are not tracked by axum's graceful shutdown
    connections.close();
    if tokio::time::timeout(drain_timeout, connections.wait())
        .await
        .is_err()
    {
        tracing::warn!(
            remaining = connections.len(),
            "Timed out waiting for WebSocket connections to close"
        );
    }

    tracing::info!("Dicerelay shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
