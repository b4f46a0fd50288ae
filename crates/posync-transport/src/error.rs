use crate::ConnectionId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed. Fatal at startup.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Connecting to a remote host failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// No live connection has this id (never existed or already closed).
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The connection went away while data was queued for it.
    #[error("connection {0} closed")]
    ConnectionClosed(ConnectionId),
}
