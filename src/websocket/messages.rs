//! WebSocket Message Types
//!
//! Defines the relay envelope sent to clients and the inbound message the
//! reader hands to the hub.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use super::connection::ConnectionId;

/// Structured wrapper for both relayed content and join/leave notices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Id of the sending connection (absent for system notices)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Present in the format, never used for routing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    /// Message body
    pub content: String,
    /// Outward-facing address of this server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_ip: Option<String>,
    /// Address of the peer the message concerns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_ip: Option<String>,
}

impl Envelope {
    /// Envelope for a message relayed from a client
    pub fn relayed(message: &InboundMessage, server_ip: &str) -> Self {
        Self {
            sender: Some(message.sender.clone()),
            recipient: None,
            content: message.content.clone(),
            server_ip: Some(server_ip.to_string()),
            sender_ip: message.sender_addr.map(|a| a.to_string()),
        }
    }

    /// Envelope for a join/leave notice
    pub fn system(event: SystemEvent, peer: Option<SocketAddr>, server_ip: &str) -> Self {
        Self {
            sender: None,
            recipient: None,
            content: event.text().to_string(),
            server_ip: Some(server_ip.to_string()),
            sender_ip: peer.map(|a| a.to_string()),
        }
    }
}

/// A frame received from a client, on its way to the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: ConnectionId,
    pub content: String,
    pub sender_addr: Option<SocketAddr>,
}

/// Membership change announced to the other connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    Joined,
    Left,
}

impl SystemEvent {
    pub fn text(self) -> &'static str {
        match self {
            SystemEvent::Joined => "A new socket has connected.",
            SystemEvent::Left => "A socket has disconnected.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relayed_envelope_serialize() {
        let message = InboundMessage {
            sender: "abc-123".to_string(),
            content: "hello".to_string(),
            sender_addr: Some("10.0.0.7:51000".parse().unwrap()),
        };
        let json = serde_json::to_string(&Envelope::relayed(&message, "10.0.0.1")).unwrap();

        assert!(json.contains("\"sender\":\"abc-123\""));
        assert!(json.contains("\"content\":\"hello\""));
        assert!(json.contains("\"serverIp\":\"10.0.0.1\""));
        assert!(json.contains("\"senderIp\":\"10.0.0.7:51000\""));
        assert!(!json.contains("recipient"));
    }

    #[test]
    fn test_system_envelope_has_no_sender() {
        let envelope = Envelope::system(SystemEvent::Left, None, "localhost");
        let json = serde_json::to_string(&envelope).unwrap();

        assert!(!json.contains("\"sender\""));
        assert!(!json.contains("senderIp"));
        assert!(json.contains("A socket has disconnected."));
    }

    #[test]
    fn test_envelope_deserialize_minimal() {
        let envelope: Envelope = serde_json::from_str(r#"{"content": "hi"}"#).unwrap();
        assert_eq!(envelope.content, "hi");
        assert!(envelope.sender.is_none());
        assert!(envelope.recipient.is_none());
    }
}
