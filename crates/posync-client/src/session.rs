//! The client half of the protocol.

use std::collections::BTreeMap;

use posync_protocol::{Message, PositionEntry, RosterEntry, Vec3, validate_name};
use posync_transport::ConnectionId;

use crate::{ClientError, PeerMirror, Presentation};

/// Where the client is in its connection lifecycle.
///
/// ```text
///   Disconnected ──(connect)──→ AwaitingIdentity ──(own mirror)──→ Active
///        ↑                            │                               │
///        └─────────────────(disconnect)───────────────────────────────┘
/// ```
///
/// There is no automatic reconnect: leaving `Disconnected` again takes an
/// explicit [`ClientSession::on_connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    #[default]
    Disconnected,
    /// Transport is up, waiting for `ASKNAME` to learn our id.
    AwaitingIdentity,
    /// Our own mirror exists; position exchange is live.
    Active,
}

/// Client-side protocol state: our identity and a mirror of every peer.
///
/// The session is transport-agnostic. Feed it decoded messages through
/// [`handle_message`](Self::handle_message) and send back whatever reply
/// it returns.
#[derive(Debug, Clone)]
pub struct ClientSession {
    state: ClientState,
    local_name: String,
    local_position: Vec3,
    our_id: Option<ConnectionId>,
    /// Set once the server has broadcast a `CNN` for our own id.
    confirmed: bool,
    peers: BTreeMap<ConnectionId, PeerMirror>,
}

impl ClientSession {
    /// A disconnected session that will introduce itself as `local_name`.
    ///
    /// # Errors
    /// [`ClientError::InvalidName`] if the name is empty or contains `|`
    /// or `%`, since the server could never learn it.
    pub fn new(local_name: impl Into<String>) -> Result<Self, ClientError> {
        let local_name = local_name.into();
        validate_name(&local_name).map_err(ClientError::InvalidName)?;
        Ok(Self {
            state: ClientState::Disconnected,
            local_name,
            local_position: Vec3::ZERO,
            our_id: None,
            confirmed: false,
            peers: BTreeMap::new(),
        })
    }

    /// The transport connected. No mirror activity happens until `ASKNAME`.
    pub fn on_connect(&mut self) {
        if self.state != ClientState::Disconnected {
            tracing::warn!(state = ?self.state, "connect while already connected, ignoring");
            return;
        }
        self.state = ClientState::AwaitingIdentity;
        tracing::info!(name = %self.local_name, "connected, awaiting identity");
    }

    /// The transport disconnected. Every mirror is dropped, with a
    /// `peer_removed` hook for each.
    pub fn on_disconnect<P: Presentation + ?Sized>(&mut self, presentation: &mut P) {
        if self.state == ClientState::Disconnected {
            return;
        }
        for id in std::mem::take(&mut self.peers).into_keys() {
            presentation.peer_removed(id);
        }
        tracing::info!(our_id = ?self.our_id, "disconnected");
        self.state = ClientState::Disconnected;
        self.our_id = None;
        self.confirmed = false;
    }

    /// Applies one message from the server.
    ///
    /// Returns the reply to send, if any: `NAMEIS` for an `ASKNAME`, and
    /// exactly one `MYPOSITION` per `ASKPOSITION` while active.
    ///
    /// # Errors
    /// - [`ClientError::NotConnected`] while disconnected.
    /// - [`ClientError::UnexpectedMessage`] for server-bound kinds.
    /// - [`ClientError::ProtocolViolation`] for a second `ASKNAME`.
    ///
    /// State is unchanged whenever an error is returned.
    pub fn handle_message<P: Presentation + ?Sized>(
        &mut self,
        message: Message,
        presentation: &mut P,
    ) -> Result<Option<Message>, ClientError> {
        if self.state == ClientState::Disconnected {
            return Err(ClientError::NotConnected);
        }
        match message {
            Message::AskName { id, roster } => self.on_ask_name(id, roster, presentation).map(Some),
            Message::Connected { name, id } => {
                self.on_connected(id, name, presentation);
                Ok(None)
            }
            Message::Disconnected { id } => {
                self.on_peer_left(id, presentation);
                Ok(None)
            }
            Message::AskPosition { positions } => Ok(self.on_ask_position(positions, presentation)),
            other @ (Message::NameIs { .. } | Message::MyPosition { .. }) => {
                Err(ClientError::UnexpectedMessage(other.header()))
            }
        }
    }

    fn on_ask_name<P: Presentation + ?Sized>(
        &mut self,
        id: ConnectionId,
        roster: Vec<RosterEntry>,
        presentation: &mut P,
    ) -> Result<Message, ClientError> {
        if let Some(current) = self.our_id {
            return Err(ClientError::ProtocolViolation(format!(
                "ASKNAME for {id} after identity {current} was assigned"
            )));
        }
        self.our_id = Some(id);
        tracing::info!(our_id = %id, peers = roster.len(), "identity assigned");
        presentation.local_identity_assigned(id);

        for entry in roster {
            self.materialize(entry.id, entry.name, presentation);
        }
        if self.state != ClientState::Active {
            tracing::warn!(our_id = %id, "roster did not include our own entry");
        }

        Ok(Message::NameIs {
            name: self.local_name.clone(),
        })
    }

    fn on_connected<P: Presentation + ?Sized>(
        &mut self,
        id: ConnectionId,
        name: String,
        presentation: &mut P,
    ) {
        if Some(id) == self.our_id {
            self.confirmed = true;
            tracing::debug!(our_id = %id, %name, "own name confirmed");
        }
        self.materialize(id, name, presentation);
    }

    fn on_peer_left<P: Presentation + ?Sized>(&mut self, id: ConnectionId, presentation: &mut P) {
        if Some(id) == self.our_id {
            tracing::warn!(our_id = %id, "server announced our own departure");
        }
        match self.peers.remove(&id) {
            Some(peer) => {
                tracing::info!(%id, name = %peer.name, "peer left");
                presentation.peer_removed(id);
            }
            None => tracing::debug!(%id, "DC for unknown peer"),
        }
    }

    fn on_ask_position<P: Presentation + ?Sized>(
        &mut self,
        positions: Vec<PositionEntry>,
        presentation: &mut P,
    ) -> Option<Message> {
        if self.state != ClientState::Active {
            tracing::debug!(state = ?self.state, "ignoring ASKPOSITION before identity");
            return None;
        }
        for entry in positions {
            if Some(entry.id) == self.our_id {
                continue;
            }
            match self.peers.get_mut(&entry.id) {
                Some(peer) => {
                    peer.position = entry.position;
                    presentation.peer_position_updated(entry.id, entry.position);
                }
                // Unreliable traffic can outrun the CNN that introduces a peer.
                None => tracing::trace!(id = %entry.id, "position for unknown peer"),
            }
        }
        Some(Message::MyPosition {
            position: self.local_position,
        })
    }

    /// Adds or renames the mirror for `id`.
    fn materialize<P: Presentation + ?Sized>(
        &mut self,
        id: ConnectionId,
        name: String,
        presentation: &mut P,
    ) {
        match self.peers.get_mut(&id) {
            Some(peer) if peer.name == name => {}
            Some(peer) => {
                tracing::info!(%id, from = %peer.name, to = %name, "peer renamed");
                peer.name = name;
                presentation.peer_renamed(id, &peer.name);
            }
            None => {
                tracing::info!(%id, %name, "peer added");
                presentation.peer_added(id, &name);
                self.peers.insert(id, PeerMirror::new(id, name));
            }
        }
        if Some(id) == self.our_id && self.state == ClientState::AwaitingIdentity {
            self.state = ClientState::Active;
            tracing::debug!(our_id = %id, "session active");
        }
    }

    /// Where the local participant is. Sent in the next `MYPOSITION`.
    pub fn set_local_position(&mut self, position: Vec3) {
        self.local_position = position;
    }

    pub fn local_position(&self) -> Vec3 {
        self.local_position
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Our connection id, once `ASKNAME` has arrived.
    pub fn our_id(&self) -> Option<ConnectionId> {
        self.our_id
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Whether the server has broadcast our chosen name back to us.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Every mirrored participant, ours included, ordered by id.
    pub fn peers(&self) -> impl Iterator<Item = &PeerMirror> {
        self.peers.values()
    }

    pub fn peer(&self, id: ConnectionId) -> Option<&PeerMirror> {
        self.peers.get(&id)
    }
}

// =========================================================================
// Tests
// =========================================================================
