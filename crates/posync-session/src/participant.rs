//! The server's record of one connected peer.

use posync_protocol::{PositionEntry, RosterEntry, Vec3};
use posync_transport::ConnectionId;

/// Name shown for a participant until it announces its own.
pub const DEFAULT_PLACEHOLDER_NAME: &str = "TEMP";

/// Where a participant is in the naming handshake.
///
/// ```text
///   Unnamed ──(NAMEIS)──→ Named
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    /// Connected, still carrying the placeholder name.
    Unnamed,
    /// Announced a display name.
    Named,
}

/// One connected participant.
///
/// The registry holding these is the single source of truth for names and
/// positions; clients only ever hold mirrors.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: ConnectionId,
    pub name: String,
    pub position: Vec3,
    pub state: ParticipantState,
}

impl Participant {
    /// A freshly connected participant: placeholder name, at the origin.
    pub fn new(id: ConnectionId, placeholder_name: &str) -> Self {
        Self {
            id,
            name: placeholder_name.to_owned(),
            position: Vec3::ZERO,
            state: ParticipantState::Unnamed,
        }
    }

    pub fn is_named(&self) -> bool {
        self.state == ParticipantState::Named
    }

    /// This participant as a roster tuple.
    pub fn roster_entry(&self) -> RosterEntry {
        RosterEntry::new(self.name.clone(), self.id)
    }

    /// This participant as a position tuple.
    pub fn position_entry(&self) -> PositionEntry {
        PositionEntry::new(self.id, self.position)
    }
}
