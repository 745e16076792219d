//! Data Transfer Objects
//!
//! Response types for the JSON endpoints.

use serde::Serialize;

use crate::websocket::HubStats;

/// `/stats` response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Active broadcast transform: "relay" or "dice"
    pub mode: String,
    /// Hub counters, including the live connection count
    pub hub: HubStats,
    /// Outward-facing server address
    pub server_ip: String,
    /// RFC 3339 start time
    pub started_at: String,
    pub uptime_seconds: u64,
    pub version: String,
}
