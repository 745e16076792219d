//! WebSocket Fan-Out Relay
//!
//! Every client connected to `/ws` can send text frames; the hub rebroadcasts
//! each one to the other live clients.
//!
//! ## Architecture
//!
//! - **ConnectionHub**: single task owning the live connection set
//! - **Connection**: id, peer address and bounded outbound queue
//! - **Handler**: upgrade, then one reader and one writer task per connection
//! - **Transform**: formats relayed messages and join/leave notices
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:5069/ws');
//!
//! ws.onopen = () => ws.send('roll');
//!
//! ws.onmessage = (event) => {
//!   console.log('Received:', event.data);
//! };
//! ```

mod connection;
mod handler;
mod hub;
mod messages;
mod transform;

pub use connection::{
    outbound_queue, Connection, ConnectionId, EnqueueError, OutboundQueue, OutboundReceiver,
    QueueState,
};
pub use handler::{origin_allowed, websocket_handler, ConnectionSettings};
pub use hub::{ConnectionHub, HubConfig, HubError, HubStats};
pub use messages::{Envelope, InboundMessage, SystemEvent};
pub use transform::{
    build_transform, BroadcastTransform, DiceRoll, EnvelopeRelay, Outbound, RelayMode, Roll,
    TransformError,
};
