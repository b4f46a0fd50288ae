//! The boundary between the protocol and whatever draws avatars.
//!
//! The client session calls these hooks as its mirror changes. An engine
//! spawns, renames, moves, and despawns avatars in response; the session
//! itself never knows anything about rendering.

use posync_protocol::Vec3;
use posync_transport::ConnectionId;

/// Receives peer mirror changes. Every hook defaults to a no-op.
pub trait Presentation {
    /// A peer entered the mirror (including the local participant).
    fn peer_added(&mut self, _id: ConnectionId, _name: &str) {}

    /// A mirrored peer changed its display name.
    fn peer_renamed(&mut self, _id: ConnectionId, _name: &str) {}

    /// A peer left the mirror. Release anything bound to it.
    fn peer_removed(&mut self, _id: ConnectionId) {}

    /// A remote peer's position arrived.
    fn peer_position_updated(&mut self, _id: ConnectionId, _position: Vec3) {}

    /// The server told us our own connection id.
    fn local_identity_assigned(&mut self, _id: ConnectionId) {}
}

/// Discards every hook.
impl Presentation for () {}

/// One hook invocation, recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    Added { id: ConnectionId, name: String },
    Renamed { id: ConnectionId, name: String },
    Removed { id: ConnectionId },
    PositionUpdated { id: ConnectionId, position: Vec3 },
    LocalIdentityAssigned { id: ConnectionId },
}

/// Records every hook in call order. Handy for headless clients and tests.
impl Presentation for Vec<PeerEvent> {
    fn peer_added(&mut self, id: ConnectionId, name: &str) {
        self.push(PeerEvent::Added {
            id,
            name: name.to_owned(),
        });
    }

    fn peer_renamed(&mut self, id: ConnectionId, name: &str) {
        self.push(PeerEvent::Renamed {
            id,
            name: name.to_owned(),
        });
    }

    fn peer_removed(&mut self, id: ConnectionId) {
        self.push(PeerEvent::Removed { id });
    }

    fn peer_position_updated(&mut self, id: ConnectionId, position: Vec3) {
        self.push(PeerEvent::PositionUpdated { id, position });
    }

    fn local_identity_assigned(&mut self, id: ConnectionId) {
        self.push(PeerEvent::LocalIdentityAssigned { id });
    }
}
