//! Server-side session state for posync.
//!
//! - [`Registry`]: the authoritative table of connected participants.
//! - [`SessionController`]: the protocol state machine that mutates the
//!   registry and decides what to send to whom.
//!
//! Both are plain owned values. Nothing here locks, spawns, or does I/O;
//! the driver in the `posync` crate feeds events in and carries the
//! resulting [`Outbound`] messages to the transport.

mod controller;
mod error;
mod participant;
mod registry;

pub use controller::{Outbound, Recipient, SessionController};
pub use error::SessionError;
pub use participant::{DEFAULT_PLACEHOLDER_NAME, Participant, ParticipantState};
pub use registry::Registry;
