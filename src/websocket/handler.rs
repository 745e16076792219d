//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle:
//! register with the hub, run one reader and one writer task, and wait for
//! both before returning.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use super::connection::{Connection, ConnectionId, OutboundReceiver};
use super::hub::ConnectionHub;
use super::messages::InboundMessage;
use crate::api::{ApiError, AppState};

/// Per-connection settings taken from the hub configuration
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub queue_capacity: usize,
    pub write_timeout: Duration,
}

/// WebSocket upgrade handler
///
/// Rejects the upgrade with 404 when the handshake is invalid and with 403
/// when an origin allow-list is configured and the request's origin is not
/// on it. Neither case touches the hub.
pub async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    if !origin_allowed(origin, &state.config.server.allowed_origins) {
        tracing::warn!(origin = ?origin, "Rejected WebSocket origin");
        return Err(ApiError::Forbidden(format!(
            "Origin not allowed: {}",
            origin.unwrap_or("<none>")
        )));
    }

    let ws = ws.map_err(|e| {
        tracing::warn!(error = %e, "Error during WebSocket upgrade");
        ApiError::NotFound("WebSocket upgrade required".to_string())
    })?;

    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let hub = state.hub.clone();
    let settings = state.config.hub.connection_settings();
    let tracker = state.connections.clone();

    Ok(ws
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| {
            tracker.track_future(handle_socket(socket, peer, hub, settings))
        }))
}

/// An empty allow-list accepts every origin
pub fn origin_allowed(origin: Option<&str>, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    match origin {
        Some(origin) => allowed.iter().any(|a| a.eq_ignore_ascii_case(origin)),
        None => false,
    }
}

/// Handle an established WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    peer: Option<SocketAddr>,
    hub: ConnectionHub,
    settings: ConnectionSettings,
) {
    let (connection, outbound) = Connection::new(peer, settings.queue_capacity);
    let connection_id = connection.id.clone();
    let (mut sender, receiver) = socket.split();

    if let Err(e) = hub.register(connection).await {
        tracing::warn!(peer = ?peer, error = %e, "Failed to register WebSocket connection");
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    let mut send_task = tokio::spawn(write_loop(
        sender,
        outbound,
        connection_id.clone(),
        hub.clone(),
        settings.write_timeout,
    ));
    let mut recv_task = tokio::spawn(read_loop(
        receiver,
        connection_id.clone(),
        peer,
        hub.clone(),
    ));

    tokio::select! {
        _ = &mut recv_task => {
            // The reader unregistered; the hub closes the queue, which ends the writer.
            let _ = send_task.await;
        }
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        }
    }

    hub.unregister(&connection_id);
    tracing::debug!(connection_id = %connection_id, "Connection tasks finished");
}

/// Forward every inbound frame to the hub until the peer goes away.
///
/// Any read error or close frame is terminal: the connection is unregistered
/// and the loop ends.
pub(crate) async fn read_loop<S, E>(
    mut receiver: S,
    connection_id: ConnectionId,
    peer: Option<SocketAddr>,
    hub: ConnectionHub,
) where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(result) = receiver.next().await {
        let content = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    tracing::debug!(connection_id = %connection_id, "Skipping non UTF-8 binary frame");
                    continue;
                }
            },
            // Axum answers pings itself
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %connection_id, "Client requested close");
                break;
            }
            Err(e) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
        };

        tracing::trace!(connection_id = %connection_id, bytes = content.len(), "Received frame");

        let message = InboundMessage {
            sender: connection_id.clone(),
            content,
            sender_addr: peer,
        };
        if hub.broadcast(message).is_err() {
            break;
        }
    }

    hub.unregister(&connection_id);
}

/// Drain the outbound queue onto the socket.
///
/// Ends with a close frame once the hub closes the queue. A failed or
/// timed-out write unregisters the connection and ends the loop at once.
pub(crate) async fn write_loop<S>(
    mut sender: S,
    mut outbound: OutboundReceiver,
    connection_id: ConnectionId,
    hub: ConnectionHub,
    write_timeout: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(frame) = outbound.next().await {
        match tokio::time::timeout(write_timeout, sender.send(Message::Text(frame))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket send failed, closing connection"
                );
                hub.unregister(&connection_id);
                return;
            }
            Err(_) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    timeout_ms = write_timeout.as_millis() as u64,
                    "WebSocket send timed out, closing connection"
                );
                hub.unregister(&connection_id);
                return;
            }
        }
    }

    match tokio::time::timeout(write_timeout, sender.send(Message::Close(None))).await {
        Ok(Ok(())) => {
            let _ = tokio::time::timeout(write_timeout, sender.close()).await;
        }
        Ok(Err(e)) => {
            tracing::debug!(connection_id = %connection_id, error = %e, "Failed to send close frame");
        }
        Err(_) => {
            tracing::debug!(connection_id = %connection_id, "Timed out sending close frame");
        }
    }
}
