//! Remote operations.
//!
//! An operation is a single call against the remote store, fully resolved:
//! ids are persisted ids and payloads already carry their link fields.

use crate::{CollectionName, RecordId};
use serde::{Deserialize, Serialize};

/// Kind of a remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Insert => write!(f, "insert"),
            OpKind::Update => write!(f, "update"),
            OpKind::Delete => write!(f, "delete"),
        }
    }
}

/// An insert operation. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOp {
    /// Target collection
    pub collection: CollectionName,
    /// Full payload, link fields included
    pub payload: serde_json::Value,
}

/// An update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOp {
    /// Target collection
    pub collection: CollectionName,
    /// Record to update
    pub id: RecordId,
    /// New payload (full replacement)
    pub payload: serde_json::Value,
}

/// A delete operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOp {
    /// Target collection
    pub collection: CollectionName,
    /// Record to delete
    pub id: RecordId,
}

/// An operation against the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Insert(InsertOp),
    Update(UpdateOp),
    Delete(DeleteOp),
}

impl Operation {
    /// Get the operation kind.
    pub fn kind(&self) -> OpKind {
        match self {
            Operation::Insert(_) => OpKind::Insert,
            Operation::Update(_) => OpKind::Update,
            Operation::Delete(_) => OpKind::Delete,
        }
    }

    /// Get the collection this operation targets.
    pub fn collection(&self) -> &CollectionName {
        match self {
            Operation::Insert(op) => &op.collection,
            Operation::Update(op) => &op.collection,
            Operation::Delete(op) => &op.collection,
        }
    }

    /// Get the payload sent with this operation, if any.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            Operation::Insert(op) => Some(&op.payload),
            Operation::Update(op) => Some(&op.payload),
            Operation::Delete(_) => None,
        }
    }
}

impl InsertOp {
    /// Create a new insert operation.
    pub fn new(collection: impl Into<CollectionName>, payload: serde_json::Value) -> Self {
        Self {
            collection: collection.into(),
            payload,
        }
    }
}

impl UpdateOp {
    /// Create a new update operation.
    pub fn new(
        collection: impl Into<CollectionName>,
        id: impl Into<RecordId>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            payload,
        }
    }
}

impl DeleteOp {
    /// Create a new delete operation.
    pub fn new(collection: impl Into<CollectionName>, id: impl Into<RecordId>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}
