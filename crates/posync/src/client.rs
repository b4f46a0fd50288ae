//! `PosyncClient`: a [`ClientSession`] wired to a transport.

use posync_client::{ClientSession, Presentation};
use posync_protocol::{Codec, Message, TextCodec, Vec3};
use posync_transport::{ConnectionId, Transport, TransportEvent, WebSocketClient};

use crate::PosyncError;

/// How to reach a server and who to be there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket URL of the server.
    pub url: String,
    /// Display name sent in `NAMEIS`.
    pub name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:5701".to_string(),
            name: "player".to_string(),
        }
    }
}

/// A client connection: transport, codec, protocol state and the
/// presentation layer that gets told about peers.
pub struct PosyncClient<T: Transport, C: Codec, P: Presentation> {
    transport: T,
    codec: C,
    session: ClientSession,
    presentation: P,
    /// The link to the server, once the transport reports it.
    link: Option<ConnectionId>,
}

impl<P: Presentation> PosyncClient<WebSocketClient, TextCodec, P> {
    /// Connects to `config.url` over WebSocket, speaking UTF-16 text.
    ///
    /// # Errors
    /// - [`PosyncError::Client`] if `config.name` can't be announced; no
    ///   connection is attempted.
    /// - [`PosyncError::Transport`] if the connection cannot be made.
    pub async fn connect(config: &ClientConfig, presentation: P) -> Result<Self, PosyncError> {
        let session = ClientSession::new(config.name.clone())?;
        let transport = WebSocketClient::connect(&config.url).await?;
        Ok(Self::new(transport, TextCodec::utf16(), session, presentation))
    }
}

impl<T: Transport, C: Codec, P: Presentation> PosyncClient<T, C, P> {
    pub fn new(transport: T, codec: C, session: ClientSession, presentation: P) -> Self {
        Self {
            transport,
            codec,
            session,
            presentation,
            link: None,
        }
    }

    /// Handles every pending transport event without blocking.
    ///
    /// Returns the number of events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.transport.poll() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Waits for one transport event and handles it.
    ///
    /// Returns `false` once the transport is closed for good.
    pub async fn next(&mut self) -> bool {
        match self.transport.next_event().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Handles events until the transport closes.
    pub async fn run(&mut self) {
        while self.next().await {}
        tracing::info!("client transport closed");
    }

    /// Applies one transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connect(id) => {
                self.link = Some(id);
                self.session.on_connect();
            }
            TransportEvent::Disconnect(_) => {
                self.link = None;
                self.session.on_disconnect(&mut self.presentation);
            }
            TransportEvent::Data { conn, data, .. } => {
                let message = match self.codec.decode(&data) {
                    Ok(message) => message,
                    Err(err) => {
                        tracing::debug!(error = %err, "dropping undecodable message");
                        return;
                    }
                };
                tracing::debug!(header = %message.header(), "received");
                match self.session.handle_message(message, &mut self.presentation) {
                    Ok(Some(reply)) => self.send(conn, &reply),
                    Ok(None) => {}
                    Err(err) => tracing::warn!(error = %err, "ignoring server message"),
                }
            }
        }
    }

    fn send(&self, conn: ConnectionId, message: &Message) {
        let bytes = match self.codec.encode(message) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(header = %message.header(), error = %err, "cannot encode reply");
                return;
            }
        };
        if let Err(err) = self.transport.send(conn, message.channel(), &bytes) {
            tracing::warn!(header = %message.header(), error = %err, "send failed");
        }
    }

    /// Closes the link to the server. The session turns `Disconnected`
    /// when the transport confirms.
    pub fn disconnect(&self) -> Result<(), PosyncError> {
        if let Some(id) = self.link {
            self.transport.disconnect(id)?;
        }
        Ok(())
    }

    /// Position reported in the next `MYPOSITION`.
    pub fn set_local_position(&mut self, position: Vec3) {
        self.session.set_local_position(position);
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn presentation(&self) -> &P {
        &self.presentation
    }

    pub fn presentation_mut(&mut self) -> &mut P {
        &mut self.presentation
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
