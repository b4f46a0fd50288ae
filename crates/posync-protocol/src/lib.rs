//! Wire protocol for posync.
//!
//! This crate defines the "language" server and clients speak:
//!
//! - **Types** ([`Message`], [`Vec3`], [`RosterEntry`], [`PositionEntry`]):
//!   one tagged variant per message kind, validated once at decode time.
//! - **Grammar** ([`Message::to_wire`], `str::parse::<Message>`): the
//!   `HEADER|field|...` text form with `%`-separated tuples.
//! - **Codec** ([`Codec`] trait, [`TextCodec`]): how that text becomes
//!   bytes (UTF-16LE by default).
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer is pure: it knows nothing about connections,
//! registries, or timers.
//!
//! ```text
//! Transport (bytes) → Protocol (Message) → Session controller / client session
//! ```

mod codec;
mod error;
mod types;
pub mod wire;

pub use codec::{Codec, TextCodec, TextEncoding};
pub use error::ProtocolError;
pub use types::{Header, Message, PositionEntry, RosterEntry, Vec3};
pub use wire::validate_name;
