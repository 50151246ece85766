//! Request handlers for editing sessions.

mod sessions;
mod websocket;

pub use sessions::*;
pub use websocket::*;
