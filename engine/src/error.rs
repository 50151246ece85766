//! Error types for the Quizdraft engine.

use crate::{CollectionName, Identity};
use thiserror::Error;

/// All possible errors from the Quizdraft engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionName),

    #[error("entity not found in {collection}: {id}")]
    EntityNotFound {
        collection: CollectionName,
        id: Identity,
    },

    #[error("parent not found in {collection}: {id}")]
    ParentNotFound {
        collection: CollectionName,
        id: Identity,
    },

    #[error("duplicate identity in {collection}: {id}")]
    DuplicateIdentity {
        collection: CollectionName,
        id: Identity,
    },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("invalid identity: {0:?}")]
    InvalidIdentity(String),

    // Schema errors
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    // State errors
    #[error("root document has not been persisted yet")]
    RootNotPersisted,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
