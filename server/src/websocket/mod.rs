//! WebSocket support for live save status.
//!
//! Clients connect per session and receive a status message every time the
//! save status changes. They can also ask for a save or for the current
//! status over the same socket.

mod protocol;

pub use protocol::*;
