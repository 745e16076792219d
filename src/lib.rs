//! # Dicerelay
//!
//! Real-time WebSocket fan-out relay. Clients connect to `/ws` and send text;
//! the server rebroadcasts every message to the other connected clients,
//! either as a JSON envelope or, in dice mode, as plain text with a two-dice
//! roll appended.
//!
//! ## Modules
//!
//! - [`websocket`]: Connection hub, per-connection reader/writer loops and
//!   broadcast transforms
//! - [`api`]: HTTP surface with Axum (page, health, stats, upgrade)
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dicerelay::{serve, AppState, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env();
//!     config.validate()?;
//!
//!     let state = AppState::new(config.clone())?;
//!     serve(state, &config.server).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod net;
pub mod websocket;

pub use api::{build_router, serve, serve_with_shutdown, ApiError, AppState};

pub use config::{Config, ConfigError, HubSettings, LoggingConfig, ServerConfig};

pub use websocket::{
    BroadcastTransform, Connection, ConnectionHub, ConnectionId, DiceRoll, Envelope,
    EnvelopeRelay, HubConfig, HubError, HubStats, InboundMessage, QueueState, RelayMode,
    SystemEvent, TransformError,
};
