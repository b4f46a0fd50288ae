//! # posync
//!
//! Real-time multiplayer position synchronization.
//!
//! A server keeps the authoritative roster of connected participants and,
//! at a fixed rate, broadcasts everyone's position to everyone. Clients
//! learn their id, announce a name, mirror their peers, and answer every
//! broadcast with their own position.
//!
//! This crate wires the layers together:
//!
//! - [`PosyncServer`]: transport + codec + session controller + tick
//!   scheduler.
//! - [`PosyncClient`]: transport + codec + client session + presentation
//!   hooks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use posync::prelude::*;
//!
//! # async fn serve() -> Result<(), PosyncError> {
//! posync::init_tracing("info");
//! let mut server = PosyncServer::builder().port(5701).build().await?;
//! server.run().await
//! # }
//! ```

mod client;
mod error;
mod logging;
mod server;

pub use client::{ClientConfig, PosyncClient};
pub use error::PosyncError;
pub use logging::init_tracing;
pub use server::{PosyncServer, PosyncServerBuilder, ServerConfig};

pub use posync_client as client_session;
pub use posync_protocol as protocol;
pub use posync_session as session;
pub use posync_tick as tick;
pub use posync_transport as transport;

/// The types most programs need.
pub mod prelude {
    pub use crate::{ClientConfig, PosyncClient, PosyncError, PosyncServer, ServerConfig};
    pub use posync_client::{ClientSession, ClientState, PeerEvent, PeerMirror, Presentation};
    pub use posync_protocol::{Codec, Message, TextCodec, Vec3};
    pub use posync_transport::{
        Channel, ConnectionId, MemoryNetwork, Transport, TransportEvent,
    };
}
