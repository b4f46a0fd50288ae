//! Error types for the session layer.

use posync_transport::ConnectionId;

/// Errors raised by registry operations.
///
/// Neither is ever sent to a peer: the controller logs them and carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The operation referenced a connection that isn't in the registry
    /// (never connected, or already gone).
    #[error("unknown participant {0}")]
    UnknownParticipant(ConnectionId),

    /// The transport reported a connect for an id that is still registered.
    /// Transports must never do this; it indicates an internal bug.
    #[error("participant {0} is already registered")]
    DuplicateParticipant(ConnectionId),
}
