//! Records as exchanged with the remote store.

use crate::RecordId;
use serde::{Deserialize, Serialize};

/// A record as the remote store holds it: an assigned id and a JSON payload.
///
/// The payload carries link fields (`quiz_id`, `question_id`); the workspace
/// splits them off when it builds the entity tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Id assigned by the remote store
    pub id: RecordId,
    /// The record payload (JSON object)
    pub payload: serde_json::Value,
}

impl Record {
    /// Create a new record.
    pub fn new(id: impl Into<RecordId>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    /// Read a string field from the payload.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.payload.get(field)?.as_str()
    }
}
