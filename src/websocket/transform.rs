//! Broadcast Transforms
//!
//! The hub does not format frames itself. A [`BroadcastTransform`] chosen at
//! startup turns inbound messages and membership notices into the text that
//! is fanned out:
//!
//! - [`EnvelopeRelay`]: JSON envelope, sender excluded from its own message
//! - [`DiceRoll`]: plain text with a two-dice roll appended, sent to everyone

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

use super::messages::{Envelope, InboundMessage, SystemEvent};

/// Which transform the hub runs with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Relay each message as an envelope to every other client
    #[default]
    Relay,
    /// Roll two dice for each message and send the result to every client
    Dice,
}

impl RelayMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RelayMode::Relay => "relay",
            RelayMode::Dice => "dice",
        }
    }
}

impl std::str::FromStr for RelayMode {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relay" => Ok(RelayMode::Relay),
            "dice" => Ok(RelayMode::Dice),
            other => Err(TransformError::UnknownMode(other.to_string())),
        }
    }
}

/// A frame ready for fan-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub frame: String,
    /// Skip the originating connection when delivering
    pub exclude_sender: bool,
}

/// Turns hub events into outbound frames
pub trait BroadcastTransform: Send + Sync {
    fn mode(&self) -> RelayMode;

    /// Frame for a message received from a client
    fn relay(&self, message: &InboundMessage) -> Result<Outbound, TransformError>;

    /// Frame announcing that `peer` joined or left
    fn notice(&self, event: SystemEvent, peer: Option<SocketAddr>)
        -> Result<String, TransformError>;
}

/// Errors from building or running a transform
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Dice face set is empty")]
    EmptyFaces,

    #[error("Unknown relay mode: {0}")]
    UnknownMode(String),

    #[error("Failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Relays raw content wrapped in an [`Envelope`]
#[derive(Debug, Clone)]
pub struct EnvelopeRelay {
    server_ip: String,
}

impl EnvelopeRelay {
    pub fn new(server_ip: impl Into<String>) -> Self {
        Self {
            server_ip: server_ip.into(),
        }
    }
}

impl BroadcastTransform for EnvelopeRelay {
    fn mode(&self) -> RelayMode {
        RelayMode::Relay
    }

    fn relay(&self, message: &InboundMessage) -> Result<Outbound, TransformError> {
        let envelope = Envelope::relayed(message, &self.server_ip);
        Ok(Outbound {
            frame: serde_json::to_string(&envelope)?,
            exclude_sender: true,
        })
    }

    fn notice(
        &self,
        event: SystemEvent,
        peer: Option<SocketAddr>,
    ) -> Result<String, TransformError> {
        let envelope = Envelope::system(event, peer, &self.server_ip);
        Ok(serde_json::to_string(&envelope)?)
    }
}

/// Result of rolling two dice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roll {
    pub first: u32,
    pub second: u32,
    /// Wide enough for any two faces
    pub sum: u64,
}

impl Roll {
    /// `"<input> <first> + <second> = <sum>"`
    pub fn describe(&self, input: &str) -> String {
        format!("{} {} + {} = {}", input, self.first, self.second, self.sum)
    }
}

/// Appends a two-dice roll to every message
#[derive(Debug, Clone)]
pub struct DiceRoll {
    faces: Vec<u32>,
}

impl DiceRoll {
    pub fn new(faces: Vec<u32>) -> Result<Self, TransformError> {
        if faces.is_empty() {
            return Err(TransformError::EmptyFaces);
        }
        Ok(Self { faces })
    }

    pub fn faces(&self) -> &[u32] {
        &self.faces
    }

    /// Draw two faces independently and sum them
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> Roll {
        // faces is non-empty, so choose always yields a value
        let first = self.faces.choose(rng).copied().unwrap_or_default();
        let second = self.faces.choose(rng).copied().unwrap_or_default();
        Roll {
            first,
            second,
            sum: u64::from(first) + u64::from(second),
        }
    }
}

impl Default for DiceRoll {
    fn default() -> Self {
        Self {
            faces: (1..=6).collect(),
        }
    }
}

impl BroadcastTransform for DiceRoll {
    fn mode(&self) -> RelayMode {
        RelayMode::Dice
    }

    fn relay(&self, message: &InboundMessage) -> Result<Outbound, TransformError> {
        let roll = self.roll(&mut rand::rng());
        Ok(Outbound {
            frame: roll.describe(&message.content),
            exclude_sender: false,
        })
    }

    fn notice(
        &self,
        event: SystemEvent,
        _peer: Option<SocketAddr>,
    ) -> Result<String, TransformError> {
        Ok(event.text().to_string())
    }
}

/// Build the transform for `mode`
pub fn build_transform(
    mode: RelayMode,
    server_ip: &str,
    dice_faces: &[u32],
) -> Result<Arc<dyn BroadcastTransform>, TransformError> {
    match mode {
        RelayMode::Relay => Ok(Arc::new(EnvelopeRelay::new(server_ip))),
        RelayMode::Dice => Ok(Arc::new(DiceRoll::new(dice_faces.to_vec())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn inbound(content: &str) -> InboundMessage {
        InboundMessage {
            sender: "conn-1".to_string(),
            content: content.to_string(),
            sender_addr: Some("127.0.0.1:40000".parse().unwrap()),
        }
    }

    #[test]
    fn test_roll_sum_in_range() {
        let dice = DiceRoll::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1000 {
            let roll = dice.roll(&mut rng);
            assert!((1..=6).contains(&roll.first));
            assert!((1..=6).contains(&roll.second));
            assert_eq!(u64::from(roll.first) + u64::from(roll.second), roll.sum);
            assert!((2..=12).contains(&roll.sum));
        }
    }

    #[test]
    fn test_roll_covers_all_faces() {
        let dice = DiceRoll::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = [false; 7];

        for _ in 0..500 {
            let roll = dice.roll(&mut rng);
            seen[roll.first as usize] = true;
            seen[roll.second as usize] = true;
        }

        assert!(seen[1..].iter().all(|s| *s));
    }

    #[test]
    fn test_dice_relay_format() {
        let dice = DiceRoll::default();
        let out = dice.relay(&inbound("roll")).unwrap();
        assert!(!out.exclude_sender);

        let rest = out.frame.strip_prefix("roll ").unwrap();
        let (dice_part, sum) = rest.split_once(" = ").unwrap();
        let (first, second) = dice_part.split_once(" + ").unwrap();
        let first: u64 = first.parse().unwrap();
        let second: u64 = second.parse().unwrap();
        let sum: u64 = sum.parse().unwrap();
        assert_eq!(first + second, sum);
    }

    #[test]
    fn test_custom_faces() {
        let dice = DiceRoll::new(vec![10]).unwrap();
        let roll = dice.roll(&mut StdRng::seed_from_u64(1));
        assert_eq!(roll, Roll { first: 10, second: 10, sum: 20 });
        assert_eq!(roll.describe("go"), "go 10 + 10 = 20");
    }

    #[test]
    fn test_largest_face_does_not_overflow() {
        let dice = DiceRoll::new(vec![u32::MAX]).unwrap();
        let roll = dice.roll(&mut StdRng::seed_from_u64(3));
        assert_eq!(roll.sum, 2 * u64::from(u32::MAX));
        assert_eq!(
            dice.relay(&inbound("big")).unwrap().frame,
            "big 4294967295 + 4294967295 = 8589934590"
        );
    }

    #[test]
    fn test_empty_faces_rejected() {
        assert!(matches!(DiceRoll::new(vec![]), Err(TransformError::EmptyFaces)));
    }

    #[test]
    fn test_envelope_relay_excludes_sender() {
        let relay = EnvelopeRelay::new("10.1.1.1");
        let out = relay.relay(&inbound("hello")).unwrap();
        assert!(out.exclude_sender);

        let envelope: Envelope = serde_json::from_str(&out.frame).unwrap();
        assert_eq!(envelope.sender.as_deref(), Some("conn-1"));
        assert_eq!(envelope.content, "hello");
        assert_eq!(envelope.server_ip.as_deref(), Some("10.1.1.1"));
        assert_eq!(envelope.sender_ip.as_deref(), Some("127.0.0.1:40000"));
    }

    #[test]
    fn test_notices() {
        let peer: SocketAddr = "192.168.0.9:1234".parse().unwrap();

        let relay = EnvelopeRelay::new("srv");
        let joined: Envelope =
            serde_json::from_str(&relay.notice(SystemEvent::Joined, Some(peer)).unwrap()).unwrap();
        assert_eq!(joined.content, SystemEvent::Joined.text());
        assert_eq!(joined.sender_ip.as_deref(), Some("192.168.0.9:1234"));

        let dice = DiceRoll::default();
        assert_eq!(
            dice.notice(SystemEvent::Left, Some(peer)).unwrap(),
            "A socket has disconnected."
        );
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("DICE".parse::<RelayMode>().unwrap(), RelayMode::Dice);
        assert_eq!("relay".parse::<RelayMode>().unwrap(), RelayMode::Relay);
        assert!("echo".parse::<RelayMode>().is_err());
    }

    #[test]
    fn test_build_transform() {
        let t = build_transform(RelayMode::Dice, "srv", &[1, 2, 3]).unwrap();
        assert_eq!(t.mode(), RelayMode::Dice);
        assert!(build_transform(RelayMode::Dice, "srv", &[]).is_err());
        assert_eq!(
            build_transform(RelayMode::Relay, "srv", &[]).unwrap().mode(),
            RelayMode::Relay
        );
    }
}
