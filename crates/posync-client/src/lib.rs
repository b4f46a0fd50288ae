//! Client-side session state for posync.
//!
//! [`ClientSession`] runs the client half of the protocol: it learns its
//! own id from `ASKNAME`, answers with `NAMEIS`, keeps a [`PeerMirror`] for
//! every participant the server announces, and answers each `ASKPOSITION`
//! with exactly one `MYPOSITION`.
//!
//! Mirror changes are reported through the [`Presentation`] hooks, which is
//! where an engine spawns and moves avatars. The session itself does no
//! I/O; the `posync` crate's client driver connects it to a transport.

mod error;
mod peer;
mod presentation;
mod session;

pub use error::ClientError;
pub use peer::PeerMirror;
pub use presentation::{PeerEvent, Presentation};
pub use session::{ClientSession, ClientState};
