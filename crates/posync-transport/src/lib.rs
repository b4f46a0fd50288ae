//! Transport abstraction layer for posync.
//!
//! Everything above this crate talks to the network through the
//! [`Transport`] trait: a handful of non-blocking operations over
//! numbered connections, each send tagged with a delivery [`Channel`].
//!
//! ```text
//! driver loop ── poll() ──→ TransportEvent::{Connect, Data, Disconnect}
//!             ── send(id, Channel, bytes) ──→ peer
//! ```
//!
//! Implementations:
//!
//! - [`memory`]: in-process hub, used by tests and embedded setups
//! - `websocket` (default feature): WebSocket host and client via
//!   `tokio-tungstenite`
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryHost, MemoryNetwork, MemoryPeer};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketClient, WebSocketHost};

use std::fmt;

/// Identifier for a connection, assigned by the transport at connect time.
///
/// Unique among the connections a transport currently holds. On the wire
/// it travels as its plain decimal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Delivery quality of a send.
///
/// Identity and roster traffic must not be lost or reordered, so it goes
/// over [`Channel::ReliableOrdered`]. Position traffic is superseded every
/// tick, so losing a packet is harmless and it goes over
/// [`Channel::Unreliable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Channel {
    /// Delivered in order, no loss. Like TCP.
    #[default]
    ReliableOrdered,

    /// May be lost, may arrive out of order. Like UDP.
    Unreliable,
}

impl Channel {
    /// Small numeric identifier of the channel (0 reliable, 1 unreliable).
    pub fn id(self) -> u8 {
        match self {
            Self::ReliableOrdered => 0,
            Self::Unreliable => 1,
        }
    }
}

/// Something that happened on the transport since the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection was established.
    Connect(ConnectionId),
    /// A connection went away (closed by either side or lost).
    Disconnect(ConnectionId),
    /// A message arrived on a connection.
    Data {
        conn: ConnectionId,
        channel: Channel,
        data: Vec<u8>,
    },
}

impl TransportEvent {
    /// The connection this event is about.
    pub fn connection(&self) -> ConnectionId {
        match self {
            Self::Connect(id) | Self::Disconnect(id) => *id,
            Self::Data { conn, .. } => *conn,
        }
    }
}

/// A packet transport with reliable and unreliable delivery.
///
/// `send`, `disconnect` and `poll` never block; they either complete
/// immediately or report failure. Network I/O that needs to wait runs
/// elsewhere (background tasks for the WebSocket transport) and feeds a
/// single-consumer event queue, so the driver that owns the transport
/// can stay single-threaded.
pub trait Transport {
    /// Queues `data` for delivery to `conn` on the given channel.
    ///
    /// # Errors
    /// [`TransportError::UnknownConnection`] if the id is not live,
    /// [`TransportError::ConnectionClosed`] if it closed while sending.
    fn send(
        &self,
        conn: ConnectionId,
        channel: Channel,
        data: &[u8],
    ) -> Result<(), TransportError>;

    /// Asks the transport to close a connection. A
    /// [`TransportEvent::Disconnect`] follows once it is gone.
    fn disconnect(&self, conn: ConnectionId) -> Result<(), TransportError>;

    /// Returns the next pending event, or `None` if nothing is available.
    fn poll(&mut self) -> Option<TransportEvent>;

    /// Waits for the next event.
    ///
    /// Returns `None` once the transport is shut down and no further
    /// events can arrive.
    async fn next_event(&mut self) -> Option<TransportEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_orders_numerically() {
        assert!(ConnectionId::new(2) < ConnectionId::new(10));
    }

    #[test]
    fn test_channel_default_is_reliable() {
        assert_eq!(Channel::default(), Channel::ReliableOrdered);
        assert_eq!(Channel::ReliableOrdered.id(), 0);
        assert_eq!(Channel::Unreliable.id(), 1);
    }

    #[test]
    fn test_event_connection_covers_every_variant() {
        let id = ConnectionId::new(3);
        assert_eq!(TransportEvent::Connect(id).connection(), id);
        assert_eq!(TransportEvent::Disconnect(id).connection(), id);
        let data = TransportEvent::Data {
            conn: id,
            channel: Channel::Unreliable,
            data: vec![1, 2],
        };
        assert_eq!(data.connection(), id);
    }
}
