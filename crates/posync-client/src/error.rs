//! Error types for the client session.

use posync_protocol::{Header, ProtocolError};

/// Errors from [`ClientSession`](crate::ClientSession).
///
/// Only `InvalidName` is fatal, and it happens before any connection is
/// made. The driver logs the others and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// A message arrived while the session wasn't connected.
    #[error("session is not connected")]
    NotConnected,

    /// A server-bound message kind arrived at the client.
    #[error("unexpected {0} message from server")]
    UnexpectedMessage(Header),

    /// The server broke the handshake, e.g. a second ASKNAME.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The local display name could never be sent in `NAMEIS`.
    #[error("invalid local name: {0}")]
    InvalidName(#[source] ProtocolError),
}
