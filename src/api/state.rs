//! Application State
//!
//! Shared state accessible by all handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::task::TaskTracker;

use crate::config::Config;
use crate::net::discover_server_ip;
use crate::websocket::{build_transform, ConnectionHub, TransformError};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Handle to the connection hub task
    pub hub: ConnectionHub,
    /// Upgraded WebSocket connection tasks, awaited on shutdown
    pub connections: TaskTracker,
    /// Effective configuration
    pub config: Arc<Config>,
    /// Outward-facing address reported in envelopes
    pub server_ip: String,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    /// Wall-clock start time reported by `/stats`
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state and spawn the hub, discovering the server address
    pub fn new(config: Config) -> Result<Self, TransformError> {
        Self::with_server_ip(config, discover_server_ip())
    }

    /// Create state with a known server address
    pub fn with_server_ip(
        config: Config,
        server_ip: impl Into<String>,
    ) -> Result<Self, TransformError> {
        let server_ip = server_ip.into();
        let transform = build_transform(config.hub.mode, &server_ip, &config.hub.dice_faces)?;
        let hub = ConnectionHub::spawn(config.hub.hub_config(), transform);

        Ok(Self {
            hub,
            connections: TaskTracker::new(),
            config: Arc::new(config),
            server_ip,
            start_time: Instant::now(),
            started_at: Utc::now(),
        })
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
