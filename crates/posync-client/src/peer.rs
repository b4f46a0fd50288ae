//! What the client knows about one participant.

use posync_protocol::Vec3;
use posync_transport::ConnectionId;

/// A read-only copy of a participant as last announced by the server.
///
/// Mirrors are never authoritative: they change only when a server message
/// says so.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerMirror {
    pub id: ConnectionId,
    pub name: String,
    /// Last position from an `ASKPOSITION`, origin until the first one.
    pub position: Vec3,
}

impl PeerMirror {
    pub fn new(id: ConnectionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            position: Vec3::ZERO,
        }
    }
}
