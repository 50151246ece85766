//! The remote record store.
//!
//! The autosave engine only needs key-based CRUD from its backend. Every call
//! stands alone: there are no transactions spanning calls, and any call may
//! fail without affecting the others.

mod memory;

pub use memory::{Call, CallKind, MemoryStore};

use async_trait::async_trait;
use quizdraft_engine::Record;
use serde_json::Value;

/// Equality filter on a string payload field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    /// Accepted values; a record matches if its field equals any of them
    pub values: Vec<String>,
}

impl Filter {
    /// Match records whose `field` equals `value`.
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            values: vec![value.into()],
        }
    }

    /// Match records whose `field` equals one of `values`.
    pub fn any_of<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Check a payload against the filter.
    pub fn matches(&self, payload: &Value) -> bool {
        payload
            .get(&self.field)
            .and_then(Value::as_str)
            .is_some_and(|v| self.values.iter().any(|accepted| accepted == v))
    }
}

/// Errors from the remote store.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record not found in {collection}: {id}")]
    NotFound { collection: String, id: String },

    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Key-based CRUD over collections of JSON records.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Fetch every record of a collection that matches the filter.
    async fn fetch_all(&self, collection: &str, filter: &Filter)
        -> Result<Vec<Record>, RemoteError>;

    /// Fetch one record by id.
    async fn fetch_one(&self, collection: &str, id: &str) -> Result<Option<Record>, RemoteError>;

    /// Insert a record. The store assigns the id.
    async fn insert(&self, collection: &str, payload: &Value) -> Result<Record, RemoteError>;

    /// Replace a record's payload.
    async fn update(&self, collection: &str, id: &str, payload: &Value)
        -> Result<(), RemoteError>;

    /// Delete a record.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;
}
