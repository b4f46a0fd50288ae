//! The connection registry: who is connected right now.
//!
//! # Concurrency note
//!
//! `Registry` is a plain owned value with no locking. It is owned by the
//! [`SessionController`](crate::SessionController), which runs on a single
//! loop; events from other threads reach it through the transport's
//! single-consumer queue.

use posync_protocol::Vec3;
use posync_transport::ConnectionId;

use crate::{Participant, ParticipantState, SessionError};

/// Authoritative table of connected participants, in connection order.
///
/// At most 100 or so entries are expected, so lookups are linear scans
/// over a `Vec`. That keeps insertion order for free, which makes roster
/// and position messages reproducible.
///
/// ## Lifecycle of an entry
///
/// ```text
/// on_connect() ──→ [Unnamed] ──set_name()──→ [Named]
///                      │                        │
///                      └──── on_disconnect() ───┴──→ removed
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    participants: Vec<Participant>,
    placeholder_name: String,
}

impl Registry {
    /// An empty registry whose new entries carry `placeholder_name`.
    pub fn new(placeholder_name: impl Into<String>) -> Self {
        Self {
            participants: Vec::new(),
            placeholder_name: placeholder_name.into(),
        }
    }

    /// Registers a newly connected participant with the placeholder name
    /// at the origin.
    ///
    /// # Errors
    /// [`SessionError::DuplicateParticipant`] if `id` is already
    /// registered. The existing entry is left untouched.
    pub fn on_connect(&mut self, id: ConnectionId) -> Result<&Participant, SessionError> {
        if self.contains(id) {
            return Err(SessionError::DuplicateParticipant(id));
        }
        self.participants
            .push(Participant::new(id, &self.placeholder_name));
        tracing::debug!(%id, count = self.participants.len(), "participant registered");
        Ok(&self.participants[self.participants.len() - 1])
    }

    /// Removes a participant, returning its last state.
    ///
    /// An unknown id is an anomaly worth logging, never a crash.
    pub fn on_disconnect(&mut self, id: ConnectionId) -> Option<Participant> {
        let Some(index) = self.index_of(id) else {
            tracing::warn!(%id, "disconnect for unregistered participant");
            return None;
        };
        let removed = self.participants.remove(index);
        tracing::debug!(%id, count = self.participants.len(), "participant removed");
        Some(removed)
    }

    /// Sets a participant's display name and marks it named.
    ///
    /// # Errors
    /// [`SessionError::UnknownParticipant`] if `id` isn't registered.
    pub fn set_name(
        &mut self,
        id: ConnectionId,
        name: impl Into<String>,
    ) -> Result<(), SessionError> {
        let participant = self.get_mut(id)?;
        participant.name = name.into();
        participant.state = ParticipantState::Named;
        Ok(())
    }

    /// Records a participant's latest reported position.
    ///
    /// # Errors
    /// [`SessionError::UnknownParticipant`] if `id` isn't registered.
    pub fn set_position(&mut self, id: ConnectionId, position: Vec3) -> Result<(), SessionError> {
        self.get_mut(id)?.position = position;
        Ok(())
    }

    /// All participants in connection order.
    pub fn snapshot(&self) -> &[Participant] {
        &self.participants
    }

    /// Ids of all participants in connection order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.participants.iter().map(|p| p.id).collect()
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn placeholder_name(&self) -> &str {
        &self.placeholder_name
    }

    fn index_of(&self, id: ConnectionId) -> Option<usize> {
        self.participants.iter().position(|p| p.id == id)
    }

    fn get_mut(&mut self, id: ConnectionId) -> Result<&mut Participant, SessionError> {
        self.participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(SessionError::UnknownParticipant(id))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(crate::DEFAULT_PLACEHOLDER_NAME)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    // =====================================================================
    // on_connect()
    // =====================================================================

    #[test]
    fn test_on_connect_inserts_placeholder_at_origin() {
        let mut reg = Registry::default();

        let p = reg.on_connect(cid(1)).expect("should register");

        assert_eq!(p.id, cid(1));
        assert_eq!(p.name, "TEMP");
        assert_eq!(p.position, Vec3::ZERO);
        assert_eq!(p.state, ParticipantState::Unnamed);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_on_connect_duplicate_is_rejected_and_keeps_original() {
        let mut reg = Registry::default();
        reg.on_connect(cid(1)).unwrap();
        reg.set_name(cid(1), "Alice").unwrap();

        let result = reg.on_connect(cid(1));

        assert_eq!(result, Err(SessionError::DuplicateParticipant(cid(1))));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(cid(1)).unwrap().name, "Alice");
    }

    #[test]
    fn test_on_connect_uses_configured_placeholder() {
        let mut reg = Registry::new("???");
        assert_eq!(reg.on_connect(cid(4)).unwrap().name, "???");
        assert_eq!(reg.placeholder_name(), "???");
    }

    // =====================================================================
    // on_disconnect()
    // =====================================================================

    #[test]
    fn test_on_disconnect_removes_and_returns_participant() {
        let mut reg = Registry::default();
        reg.on_connect(cid(1)).unwrap();
        reg.on_connect(cid(2)).unwrap();

        let removed = reg.on_disconnect(cid(1)).expect("was registered");

        assert_eq!(removed.id, cid(1));
        assert_eq!(reg.ids(), vec![cid(2)]);
    }

    #[test]
    fn test_on_disconnect_unknown_is_noop() {
        let mut reg = Registry::default();
        reg.on_connect(cid(1)).unwrap();

        assert!(reg.on_disconnect(cid(9)).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_reconnect_after_disconnect_starts_fresh() {
        let mut reg = Registry::default();
        reg.on_connect(cid(1)).unwrap();
        reg.set_name(cid(1), "Alice").unwrap();
        reg.set_position(cid(1), Vec3::new(1.0, 1.0, 1.0)).unwrap();
        reg.on_disconnect(cid(1));

        let p = reg.on_connect(cid(1)).unwrap();

        assert_eq!(p.name, "TEMP");
        assert_eq!(p.position, Vec3::ZERO);
    }

    // =====================================================================
    // set_name() / set_position()
    // =====================================================================

    #[test]
    fn test_set_name_marks_named() {
        let mut reg = Registry::default();
        reg.on_connect(cid(3)).unwrap();

        reg.set_name(cid(3), "Bob").unwrap();

        let p = reg.get(cid(3)).unwrap();
        assert_eq!(p.name, "Bob");
        assert!(p.is_named());
    }

    #[test]
    fn test_set_name_unknown_participant() {
        let mut reg = Registry::default();
        assert_eq!(
            reg.set_name(cid(3), "Bob"),
            Err(SessionError::UnknownParticipant(cid(3)))
        );
    }

    #[test]
    fn test_set_position_overwrites() {
        let mut reg = Registry::default();
        reg.on_connect(cid(1)).unwrap();

        reg.set_position(cid(1), Vec3::new(1.0, 2.0, 3.0)).unwrap();
        reg.set_position(cid(1), Vec3::new(4.0, 5.0, 6.0)).unwrap();

        assert_eq!(reg.get(cid(1)).unwrap().position, Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_set_position_unknown_participant() {
        let mut reg = Registry::default();
        assert_eq!(
            reg.set_position(cid(8), Vec3::ZERO),
            Err(SessionError::UnknownParticipant(cid(8)))
        );
    }

    // =====================================================================
    // snapshot()
    // =====================================================================

    #[test]
    fn test_snapshot_is_in_connection_order() {
        let mut reg = Registry::default();
        for n in [5, 2, 9] {
            reg.on_connect(cid(n)).unwrap();
        }
        reg.on_disconnect(cid(2));
        reg.on_connect(cid(2)).unwrap();

        let ids: Vec<_> = reg.snapshot().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![cid(5), cid(9), cid(2)]);
    }

    #[test]
    fn test_empty_registry() {
        let reg = Registry::default();
        assert!(reg.is_empty());
        assert!(reg.snapshot().is_empty());
        assert!(!reg.contains(cid(1)));
    }
}
