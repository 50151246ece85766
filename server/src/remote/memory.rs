//! In-memory record store.
//!
//! Backs the server when no database is configured, and the tests. Every
//! call is logged, and calls can be made to fail or to take time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use quizdraft_engine::Record;
use serde_json::Value;

use super::{Filter, RemoteError, RemoteStore};
use crate::lock;

/// Kind of a store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    FetchAll,
    FetchOne,
    Insert,
    Update,
    Delete,
}

/// A logged store call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub kind: CallKind,
    pub collection: String,
    /// Target id, for calls that name one
    pub id: Option<String>,
    /// Payload sent, for inserts and updates
    pub payload: Option<Value>,
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self.kind,
            CallKind::Insert | CallKind::Update | CallKind::Delete
        )
    }
}

type RejectRule = Box<dyn Fn(&Call) -> bool + Send + Sync>;

/// Records kept in memory, one ordered list per collection.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, Vec<Record>>,
    next_id: AtomicU64,
    calls: Mutex<Vec<Call>>,
    reject: Mutex<Vec<RejectRule>>,
    latency: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a record in place without logging a call.
    pub fn seed(&self, collection: &str, record: Record) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(record);
    }

    /// Current records of a collection.
    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.collections
            .get(collection)
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Get one record without logging a call.
    pub fn get(&self, collection: &str, id: &str) -> Option<Record> {
        self.collections
            .get(collection)?
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Calls that change data.
    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Reject every later call for which `rule` returns true.
    pub fn reject_when<F>(&self, rule: F)
    where
        F: Fn(&Call) -> bool + Send + Sync + 'static,
    {
        lock(&self.reject).push(Box::new(rule));
    }

    /// Stop rejecting calls.
    pub fn accept_all(&self) {
        lock(&self.reject).clear();
    }

    /// Make every write take `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    async fn record_call(&self, call: Call) -> Result<(), RemoteError> {
        let rejected = lock(&self.reject).iter().any(|rule| rule(&call));
        let latency = *lock(&self.latency);
        lock(&self.calls).push(call.clone());

        if let Some(latency) = latency.filter(|_| call.is_write()) {
            tokio::time::sleep(latency).await;
        }
        if rejected {
            tracing::debug!(collection = %call.collection, kind = ?call.kind, "Rejecting call");
            return Err(RemoteError::Rejected(format!(
                "{:?} on {} refused",
                call.kind, call.collection
            )));
        }
        Ok(())
    }

    fn not_found(collection: &str, id: &str) -> RemoteError {
        RemoteError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch_all(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Record>, RemoteError> {
        self.record_call(Call {
            kind: CallKind::FetchAll,
            collection: collection.to_string(),
            id: None,
            payload: None,
        })
        .await?;

        Ok(self
            .collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| filter.matches(&r.payload))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_one(&self, collection: &str, id: &str) -> Result<Option<Record>, RemoteError> {
        self.record_call(Call {
            kind: CallKind::FetchOne,
            collection: collection.to_string(),
            id: Some(id.to_string()),
            payload: None,
        })
        .await?;

        Ok(self.get(collection, id))
    }

    async fn insert(&self, collection: &str, payload: &Value) -> Result<Record, RemoteError> {
        self.record_call(Call {
            kind: CallKind::Insert,
            collection: collection.to_string(),
            id: None,
            payload: Some(payload.clone()),
        })
        .await?;

        // Sequential ids keep test expectations readable.
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = Record::new(format!("r{n}"), payload.clone());
        self.seed(collection, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        payload: &Value,
    ) -> Result<(), RemoteError> {
        self.record_call(Call {
            kind: CallKind::Update,
            collection: collection.to_string(),
            id: Some(id.to_string()),
            payload: Some(payload.clone()),
        })
        .await?;

        let mut records = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| Self::not_found(collection, id))?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Self::not_found(collection, id))?;
        record.payload = payload.clone();
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        self.record_call(Call {
            kind: CallKind::Delete,
            collection: collection.to_string(),
            id: Some(id.to_string()),
            payload: None,
        })
        .await?;

        let mut records = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| Self::not_found(collection, id))?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(Self::not_found(collection, id));
        }
        Ok(())
    }
}
