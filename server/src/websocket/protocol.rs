//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded and tagged by a snake_case `type` field.

use quizdraft_engine::StatusReport;
use serde::{Deserialize, Serialize};

use crate::autosave::CycleSummary;

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for the current status report.
    Status,

    /// Save now instead of waiting for the quiet period.
    Save {
        /// Request ID for correlating responses
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The save status changed (or was asked for).
    Status {
        #[serde(flatten)]
        report: StatusReport,
    },

    /// Response to a save request.
    Saved {
        summary: CycleSummary,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        /// Error description
        message: String,
        /// Request ID from the original request (if applicable)
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }

    pub fn status(report: StatusReport) -> Self {
        ServerMessage::Status { report }
    }
}
