//! The server-side protocol state machine.
//!
//! [`SessionController`] owns the [`Registry`] and turns transport events
//! and decoded client messages into registry mutations plus a list of
//! outgoing messages. It never touches a transport: the caller resolves
//! each [`Outbound`]'s [`Recipient`] against the registry at send time and
//! does the sending. That keeps the whole protocol testable without
//! sockets.
//!
//! | Event            | Emits                                   |
//! |------------------|-----------------------------------------|
//! | connect(id)      | `ASKNAME` to `id`                       |
//! | `NAMEIS` from id | `CNN` to all, `id` included             |
//! | `MYPOSITION`     | nothing                                 |
//! | disconnect(id)   | `DC` to all remaining                   |
//! | tick             | `ASKPOSITION` to all                    |

use posync_protocol::{Message, PositionEntry, Vec3};
use posync_transport::ConnectionId;

use crate::{Registry, SessionError};

/// Who an outgoing message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every participant registered when the message is sent.
    All,
    /// One connection.
    Connection(ConnectionId),
}

/// A message the controller wants delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub recipient: Recipient,
    pub message: Message,
}

impl Outbound {
    pub fn to_all(message: Message) -> Self {
        Self {
            recipient: Recipient::All,
            message,
        }
    }

    pub fn to(id: ConnectionId, message: Message) -> Self {
        Self {
            recipient: Recipient::Connection(id),
            message,
        }
    }
}

/// Drives the registry from transport events and client messages.
///
/// Every handler returns the messages to send, in order. An empty vector
/// means the event was absorbed (or dropped as an anomaly, which is
/// logged).
#[derive(Debug, Clone, Default)]
pub struct SessionController {
    registry: Registry,
}

impl SessionController {
    /// A controller whose new participants carry `placeholder_name` until
    /// they announce themselves.
    pub fn new(placeholder_name: impl Into<String>) -> Self {
        Self {
            registry: Registry::new(placeholder_name),
        }
    }

    /// A transport connect: registers `id` and hands it the roster.
    ///
    /// The roster includes the new participant under its placeholder name,
    /// which is how the client learns its own id.
    pub fn on_connect(&mut self, id: ConnectionId) -> Vec<Outbound> {
        if let Err(err) = self.registry.on_connect(id) {
            // The transport promised unique ids; nothing sane to reply.
            tracing::error!(%id, error = %err, "ignoring connect event");
            return Vec::new();
        }
        tracing::info!(%id, participants = self.registry.len(), "participant connected");

        let roster = self
            .registry
            .snapshot()
            .iter()
            .map(|p| p.roster_entry())
            .collect();
        vec![Outbound::to(id, Message::AskName { id, roster })]
    }

    /// A decoded message from `from`.
    pub fn on_message(&mut self, from: ConnectionId, message: Message) -> Vec<Outbound> {
        match message {
            Message::NameIs { name } => self.on_name(from, name),
            Message::MyPosition { position } => {
                self.on_position(from, position);
                Vec::new()
            }
            other => {
                tracing::debug!(
                    %from,
                    header = %other.header(),
                    "dropping server-bound message of client-bound kind"
                );
                Vec::new()
            }
        }
    }

    fn on_name(&mut self, from: ConnectionId, name: String) -> Vec<Outbound> {
        let previous = match self.registry.get(from) {
            Some(p) => p.name.clone(),
            None => {
                let err = SessionError::UnknownParticipant(from);
                tracing::warn!(error = %err, "dropping NAMEIS");
                return Vec::new();
            }
        };
        if let Err(err) = self.registry.set_name(from, name.clone()) {
            tracing::warn!(error = %err, "dropping NAMEIS");
            return Vec::new();
        }
        tracing::info!(id = %from, %name, %previous, "participant named");

        vec![Outbound::to_all(Message::Connected { name, id: from })]
    }

    fn on_position(&mut self, from: ConnectionId, position: Vec3) {
        match self.registry.set_position(from, position) {
            Ok(()) => tracing::trace!(id = %from, %position, "position updated"),
            Err(err) => tracing::warn!(error = %err, "dropping MYPOSITION"),
        }
    }

    /// A transport disconnect: forgets `id` and tells everyone left.
    ///
    /// An id that isn't registered emits nothing.
    pub fn on_disconnect(&mut self, id: ConnectionId) -> Vec<Outbound> {
        let Some(gone) = self.registry.on_disconnect(id) else {
            return Vec::new();
        };
        tracing::info!(
            %id,
            name = %gone.name,
            participants = self.registry.len(),
            "participant disconnected"
        );
        vec![Outbound::to_all(Message::Disconnected { id })]
    }

    /// A scheduler tick: everyone's last known position, to everyone.
    ///
    /// Fires even when no position changed since the last tick. With no
    /// participants there is nobody to send to, so nothing is emitted.
    pub fn on_tick(&self) -> Vec<Outbound> {
        if self.registry.is_empty() {
            return Vec::new();
        }
        vec![Outbound::to_all(Message::AskPosition {
            positions: self.position_snapshot(),
        })]
    }

    /// Every participant's position, in connection order.
    pub fn position_snapshot(&self) -> Vec<PositionEntry> {
        self.registry
            .snapshot()
            .iter()
            .map(|p| p.position_entry())
            .collect()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use posync_protocol::RosterEntry;

    fn cid(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    fn named(ctl: &mut SessionController, n: u64, name: &str) {
        ctl.on_connect(cid(n));
        ctl.on_message(cid(n), Message::NameIs { name: name.into() });
    }

    // =====================================================================
    // on_connect()
    // =====================================================================

    #[test]
    fn test_on_connect_first_participant_gets_own_roster_entry() {
        let mut ctl = SessionController::default();

        let out = ctl.on_connect(cid(1));

        assert_eq!(
            out,
            vec![Outbound::to(
                cid(1),
                Message::AskName {
                    id: cid(1),
                    roster: vec![RosterEntry::new("TEMP", cid(1))],
                },
            )]
        );
    }

    #[test]
    fn test_on_connect_roster_lists_everyone_in_order() {
        let mut ctl = SessionController::default();
        named(&mut ctl, 3, "Alice");

        let out = ctl.on_connect(cid(7));

        let Message::AskName { id, roster } = &out[0].message else {
            panic!("expected ASKNAME, got {:?}", out[0].message);
        };
        assert_eq!(*id, cid(7));
        assert_eq!(
            roster,
            &vec![
                RosterEntry::new("Alice", cid(3)),
                RosterEntry::new("TEMP", cid(7)),
            ]
        );
        assert_eq!(out[0].recipient, Recipient::Connection(cid(7)));
    }

    #[test]
    fn test_on_connect_duplicate_emits_nothing() {
        let mut ctl = SessionController::default();
        named(&mut ctl, 1, "Alice");

        assert!(ctl.on_connect(cid(1)).is_empty());
        assert_eq!(ctl.registry().get(cid(1)).unwrap().name, "Alice");
    }

    #[test]
    fn test_on_connect_custom_placeholder() {
        let mut ctl = SessionController::new("anon");
        let out = ctl.on_connect(cid(2));
        assert_eq!(
            out[0].message,
            Message::AskName {
                id: cid(2),
                roster: vec![RosterEntry::new("anon", cid(2))],
            }
        );
    }

    // =====================================================================
    // on_message()
    // =====================================================================

    #[test]
    fn test_on_message_nameis_broadcasts_cnn_to_all() {
        let mut ctl = SessionController::default();
        ctl.on_connect(cid(5));

        let out = ctl.on_message(cid(5), Message::NameIs { name: "Bob".into() });

        assert_eq!(
            out,
            vec![Outbound::to_all(Message::Connected {
                name: "Bob".into(),
                id: cid(5),
            })]
        );
        assert!(ctl.registry().get(cid(5)).unwrap().is_named());
    }

    #[test]
    fn test_on_message_nameis_twice_renames() {
        let mut ctl = SessionController::default();
        named(&mut ctl, 5, "Bob");

        let out = ctl.on_message(cid(5), Message::NameIs { name: "Robert".into() });

        assert_eq!(out.len(), 1);
        assert_eq!(ctl.registry().get(cid(5)).unwrap().name, "Robert");
    }

    #[test]
    fn test_on_message_nameis_from_unknown_is_dropped() {
        let mut ctl = SessionController::default();
        let out = ctl.on_message(cid(4), Message::NameIs { name: "Ghost".into() });
        assert!(out.is_empty());
        assert!(ctl.registry().is_empty());
    }

    #[test]
    fn test_on_message_myposition_is_absorbed() {
        let mut ctl = SessionController::default();
        ctl.on_connect(cid(1));

        let out = ctl.on_message(
            cid(1),
            Message::MyPosition {
                position: Vec3::new(1.5, 0.0, -2.0),
            },
        );

        assert!(out.is_empty());
        assert_eq!(
            ctl.registry().get(cid(1)).unwrap().position,
            Vec3::new(1.5, 0.0, -2.0)
        );
    }

    #[test]
    fn test_on_message_myposition_accepted_before_naming() {
        let mut ctl = SessionController::default();
        ctl.on_connect(cid(1));
        ctl.on_message(cid(1), Message::MyPosition { position: Vec3::new(1.0, 1.0, 1.0) });

        let p = ctl.registry().get(cid(1)).unwrap();
        assert!(!p.is_named());
        assert_eq!(p.position, Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_on_message_client_bound_kind_is_dropped() {
        let mut ctl = SessionController::default();
        ctl.on_connect(cid(1));

        let out = ctl.on_message(cid(1), Message::Disconnected { id: cid(1) });

        assert!(out.is_empty());
        assert!(ctl.registry().contains(cid(1)));
    }

    // =====================================================================
    // on_disconnect()
    // =====================================================================

    #[test]
    fn test_on_disconnect_broadcasts_dc() {
        let mut ctl = SessionController::default();
        named(&mut ctl, 1, "Alice");
        named(&mut ctl, 2, "Bob");

        let out = ctl.on_disconnect(cid(1));

        assert_eq!(out, vec![Outbound::to_all(Message::Disconnected { id: cid(1) })]);
        assert_eq!(ctl.registry().ids(), vec![cid(2)]);
    }

    #[test]
    fn test_on_disconnect_absent_emits_nothing() {
        let mut ctl = SessionController::default();
        ctl.on_connect(cid(1));

        assert!(ctl.on_disconnect(cid(9)).is_empty());
        assert_eq!(ctl.registry().len(), 1);
    }

    // =====================================================================
    // on_tick()
    // =====================================================================

    #[test]
    fn test_on_tick_aggregates_positions_in_order() {
        let mut ctl = SessionController::default();
        ctl.on_connect(cid(1));
        ctl.on_connect(cid(2));
        ctl.on_message(cid(2), Message::MyPosition { position: Vec3::new(1.0, 2.0, 3.0) });

        let out = ctl.on_tick();

        assert_eq!(
            out,
            vec![Outbound::to_all(Message::AskPosition {
                positions: vec![
                    PositionEntry::new(cid(1), Vec3::ZERO),
                    PositionEntry::new(cid(2), Vec3::new(1.0, 2.0, 3.0)),
                ],
            })]
        );
    }

    #[test]
    fn test_on_tick_rebroadcasts_stale_positions() {
        let mut ctl = SessionController::default();
        ctl.on_connect(cid(1));
        assert_eq!(ctl.on_tick(), ctl.on_tick());
    }

    #[test]
    fn test_on_tick_empty_registry_emits_nothing() {
        let ctl = SessionController::default();
        assert!(ctl.on_tick().is_empty());
        assert!(ctl.position_snapshot().is_empty());
    }
}
