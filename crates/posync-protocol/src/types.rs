//! Core protocol types.
//!
//! Every message that travels between server and clients is one variant of
//! [`Message`]. Each variant is a fixed-arity record validated once when it
//! is decoded, so the layers above never index into raw fields.

use std::fmt;
use std::str::FromStr;

use posync_transport::{Channel, ConnectionId};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Vec3
// ---------------------------------------------------------------------------

/// A position in world space, single precision.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// The origin. New participants start here.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// `true` if no component is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Tuples carried inside messages
// ---------------------------------------------------------------------------

/// One participant in a roster announcement. Wire form: `name%id`.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub name: String,
    pub id: ConnectionId,
}

impl RosterEntry {
    pub fn new(name: impl Into<String>, id: ConnectionId) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

/// One participant's position in an aggregate update. Wire form:
/// `id%x%y%z`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionEntry {
    pub id: ConnectionId,
    pub position: Vec3,
}

impl PositionEntry {
    pub fn new(id: ConnectionId, position: Vec3) -> Self {
        Self { id, position }
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// The message kind, as written in the first field on the wire.
///
/// Matching is exact and case-sensitive: `askname` is not a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Header {
    AskName,
    NameIs,
    Cnn,
    Dc,
    AskPosition,
    MyPosition,
}

impl Header {
    /// All headers, in protocol order.
    pub const ALL: [Header; 6] = [
        Header::AskName,
        Header::NameIs,
        Header::Cnn,
        Header::Dc,
        Header::AskPosition,
        Header::MyPosition,
    ];

    /// The exact wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AskName => "ASKNAME",
            Self::NameIs => "NAMEIS",
            Self::Cnn => "CNN",
            Self::Dc => "DC",
            Self::AskPosition => "ASKPOSITION",
            Self::MyPosition => "MYPOSITION",
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Header {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| ProtocolError::malformed(format!("unknown header {s:?}")))
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A protocol message.
///
/// ```text
/// ASKNAME|<newId>|<name%id>|...        server → new client, reliable
/// NAMEIS|<name>                         client → server, reliable
/// CNN|<name>|<id>                       server → all, reliable
/// DC|<id>                               server → all, reliable
/// ASKPOSITION|<id%x%y%z>|...            server → all, unreliable
/// MYPOSITION|<x>|<y>|<z>                client → server, unreliable
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Tells a freshly connected client its id and who is already here
    /// (including itself, under the placeholder name).
    AskName {
        id: ConnectionId,
        roster: Vec<RosterEntry>,
    },

    /// A client announcing its display name.
    NameIs { name: String },

    /// A participant was named (or renamed). Sent to everyone.
    Connected { name: String, id: ConnectionId },

    /// A participant left. Sent to everyone remaining.
    Disconnected { id: ConnectionId },

    /// Every participant's last known position; also the cue for each
    /// client to report its own.
    AskPosition { positions: Vec<PositionEntry> },

    /// A client reporting its own position.
    MyPosition { position: Vec3 },
}

impl Message {
    pub fn header(&self) -> Header {
        match self {
            Self::AskName { .. } => Header::AskName,
            Self::NameIs { .. } => Header::NameIs,
            Self::Connected { .. } => Header::Cnn,
            Self::Disconnected { .. } => Header::Dc,
            Self::AskPosition { .. } => Header::AskPosition,
            Self::MyPosition { .. } => Header::MyPosition,
        }
    }

    /// The channel this kind of message travels on.
    ///
    /// Identity and roster changes must not be lost or reordered; position
    /// traffic is superseded every tick.
    pub fn channel(&self) -> Channel {
        match self {
            Self::AskPosition { .. } | Self::MyPosition { .. } => Channel::Unreliable,
            _ => Channel::ReliableOrdered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_from_str_exact_match() {
        for header in Header::ALL {
            assert_eq!(header.as_str().parse::<Header>(), Ok(header));
        }
    }

    #[test]
    fn test_header_from_str_is_case_sensitive() {
        assert!(matches!(
            "askname".parse::<Header>(),
            Err(ProtocolError::MalformedMessage(_))
        ));
        assert!("Dc".parse::<Header>().is_err());
        assert!("".parse::<Header>().is_err());
    }

    #[test]
    fn test_message_channel_per_kind() {
        let id = ConnectionId::new(1);
        assert_eq!(
            Message::NameIs { name: "a".into() }.channel(),
            Channel::ReliableOrdered
        );
        assert_eq!(Message::Disconnected { id }.channel(), Channel::ReliableOrdered);
        assert_eq!(
            Message::AskPosition { positions: vec![] }.channel(),
            Channel::Unreliable
        );
        assert_eq!(
            Message::MyPosition { position: Vec3::ZERO }.channel(),
            Channel::Unreliable
        );
    }

    #[test]
    fn test_vec3_is_finite() {
        assert!(Vec3::new(1.0, -2.0, 3.5).is_finite());
        assert!(!Vec3::new(f32::NAN, 0.0, 0.0).is_finite());
        assert!(!Vec3::new(0.0, f32::INFINITY, 0.0).is_finite());
    }
}
