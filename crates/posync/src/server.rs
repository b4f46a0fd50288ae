//! `PosyncServer` builder and server loop.
//!
//! The server ties the layers together on one loop:
//!
//! ```text
//! transport event → decode → SessionController → Outbound → encode → send
//! scheduler tick  ─────────→ SessionController → Outbound → encode → send
//! ```
//!
//! Everything runs on the task that owns the server. The transport's
//! background I/O only ever reaches the registry through its event queue.

use std::net::SocketAddr;

use posync_protocol::{Codec, Message, TextCodec, validate_name};
use posync_session::{
    DEFAULT_PLACEHOLDER_NAME, Outbound, Recipient, Registry, SessionController,
};
use posync_tick::{TickConfig, TickScheduler};
use posync_transport::{ConnectionId, Transport, TransportEvent, WebSocketHost};
use serde::Deserialize;
use tokio::time::Instant;

use crate::PosyncError;

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Deployment parameters of a server.
///
/// Deserializable so it can come from a config file; missing fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on.
    pub host: String,
    /// Port to listen on. Default: 5701.
    pub port: u16,
    /// Connections beyond this are refused by the transport. Default: 100.
    pub max_connections: usize,
    /// Position broadcasts per second. 0 disables them. Default: 20.
    pub tick_rate_hz: u32,
    /// Name of a participant that hasn't sent `NAMEIS` yet.
    pub placeholder_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5701,
            max_connections: 100,
            tick_rate_hz: TickConfig::DEFAULT_TICK_RATE_HZ,
            placeholder_name: DEFAULT_PLACEHOLDER_NAME.to_string(),
        }
    }
}

impl ServerConfig {
    /// `host:port`, ready for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Rejects settings the server could never honor.
    ///
    /// # Errors
    /// [`PosyncError::Protocol`] if `placeholder_name` is empty or contains
    /// `|` or `%`: no `ASKNAME` roster could be encoded with it.
    pub fn validate(&self) -> Result<(), PosyncError> {
        validate_name(&self.placeholder_name)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a posync server.
///
/// # Example
///
/// ```rust,ignore
/// use posync::prelude::*;
///
/// let mut server = PosyncServer::builder()
///     .port(5701)
///     .tick_rate(20)
///     .build()
///     .await?;
/// server.run().await
/// ```
#[derive(Debug, Clone, Default)]
pub struct PosyncServerBuilder {
    config: ServerConfig,
}

impl PosyncServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Position broadcasts per second; 0 disables them.
    pub fn tick_rate(mut self, hz: u32) -> Self {
        self.config.tick_rate_hz = hz;
        self
    }

    pub fn placeholder_name(mut self, name: impl Into<String>) -> Self {
        self.config.placeholder_name = name.into();
        self
    }

    /// Binds a WebSocket host and returns a server speaking UTF-16 text.
    ///
    /// # Errors
    /// - [`PosyncError::Protocol`] if the configuration is invalid (see
    ///   [`ServerConfig::validate`]); nothing is bound.
    /// - [`PosyncError::Transport`] if the address cannot be bound.
    pub async fn build(self) -> Result<PosyncServer<WebSocketHost, TextCodec>, PosyncError> {
        self.config.validate()?;
        let host =
            WebSocketHost::bind(&self.config.bind_addr(), self.config.max_connections).await?;
        self.build_with(host, TextCodec::utf16())
    }

    /// Builds a server over any transport and codec.
    ///
    /// `max_connections` is the transport's business here; hand it a
    /// transport configured accordingly.
    ///
    /// # Errors
    /// [`PosyncError::Protocol`] if the configuration is invalid.
    pub fn build_with<T: Transport, C: Codec>(
        self,
        transport: T,
        codec: C,
    ) -> Result<PosyncServer<T, C>, PosyncError> {
        self.config.validate()?;
        Ok(PosyncServer {
            transport,
            codec,
            controller: SessionController::new(self.config.placeholder_name.clone()),
            scheduler: TickScheduler::new(TickConfig::with_rate(self.config.tick_rate_hz)),
            config: self.config,
        })
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A posync server: one transport, one registry, one broadcast timer.
///
/// Drive it either cooperatively with [`pump`](Self::pump) from an
/// existing loop, or hand it the task with [`run`](Self::run).
pub struct PosyncServer<T: Transport, C: Codec> {
    transport: T,
    codec: C,
    controller: SessionController,
    scheduler: TickScheduler,
    config: ServerConfig,
}

impl PosyncServer<WebSocketHost, TextCodec> {
    /// Creates a new builder.
    pub fn builder() -> PosyncServerBuilder {
        PosyncServerBuilder::new()
    }

    /// The address the WebSocket host is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }
}

impl<T: Transport, C: Codec> PosyncServer<T, C> {
    /// One cooperative loop step: handles every pending transport event,
    /// then broadcasts positions if a tick is due at `now`.
    ///
    /// Never blocks. Returns the number of transport events handled.
    pub fn pump(&mut self, now: Instant) -> usize {
        let mut handled = 0;
        while let Some(event) = self.transport.poll() {
            self.handle_event(event);
            handled += 1;
        }
        if self.scheduler.poll_tick(now).is_some() {
            self.broadcast_positions();
        }
        handled
    }

    /// Runs the server until the transport shuts down.
    ///
    /// Transport events and ticks are interleaved on this one task.
    pub async fn run(&mut self) -> Result<(), PosyncError> {
        tracing::info!(
            tick_rate_hz = self.scheduler.tick_rate_hz(),
            max_connections = self.config.max_connections,
            "posync server running"
        );
        loop {
            tokio::select! {
                event = self.transport.next_event() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        tracing::info!("transport shut down, server stopping");
                        return Ok(());
                    }
                },
                _ = self.scheduler.wait_for_tick() => self.broadcast_positions(),
            }
        }
    }

    /// Applies one transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        let outbound = match event {
            TransportEvent::Connect(id) => self.controller.on_connect(id),
            TransportEvent::Disconnect(id) => self.controller.on_disconnect(id),
            TransportEvent::Data { conn, data, .. } => match self.codec.decode(&data) {
                Ok(message) => {
                    tracing::debug!(%conn, header = %message.header(), "received");
                    self.controller.on_message(conn, message)
                }
                Err(err) => {
                    tracing::debug!(%conn, error = %err, "dropping undecodable message");
                    return;
                }
            },
        };
        self.dispatch(outbound);
    }

    /// Sends the aggregate position message now, outside the schedule.
    pub fn broadcast_positions(&mut self) {
        let outbound = self.controller.on_tick();
        self.dispatch(outbound);
        self.scheduler.record_tick_end();
    }

    fn dispatch(&self, outbound: Vec<Outbound>) {
        for Outbound { recipient, message } in outbound {
            let bytes = match self.codec.encode(&message) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(header = %message.header(), error = %err, "cannot encode, dropping");
                    continue;
                }
            };
            match recipient {
                Recipient::Connection(id) => self.send_to(id, &message, &bytes),
                // Fan-out to whoever is registered right now.
                Recipient::All => {
                    for participant in self.controller.registry().snapshot() {
                        self.send_to(participant.id, &message, &bytes);
                    }
                }
            }
        }
    }

    /// One send. A failure affects only this recipient.
    fn send_to(&self, id: ConnectionId, message: &Message, bytes: &[u8]) {
        match self.transport.send(id, message.channel(), bytes) {
            Ok(()) => tracing::trace!(%id, header = %message.header(), "sent"),
            Err(err) => tracing::warn!(%id, header = %message.header(), error = %err, "send failed"),
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn registry(&self) -> &Registry {
        self.controller.registry()
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    /// Mutable access for pausing and resuming broadcasts.
    pub fn scheduler_mut(&mut self) -> &mut TickScheduler {
        &mut self.scheduler
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
