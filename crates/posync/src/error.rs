//! Unified error type for posync.

use posync_client::ClientError;
use posync_protocol::ProtocolError;
use posync_session::SessionError;
use posync_transport::TransportError;

/// Top-level error wrapping every crate-specific error.
///
/// The `#[from]` conversions let `?` lift sub-crate errors directly.
/// Only transport bind/connect failures actually escape the drivers; the
/// rest are logged where they happen and never reach a peer.
#[derive(Debug, thiserror::Error)]
pub enum PosyncError {
    /// Bind, connect, or send failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed or unencodable message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Registry operation on an unknown or duplicate participant.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Client-side protocol error.
    #[error(transparent)]
    Client(#[from] ClientError),
}
