//! Snapshot of the last state known to be durably persisted.
//!
//! The snapshot is the clean baseline the dirty tracker compares against.
//! It is populated from the initial fetch and then changed one entry at a
//! time, only after the remote store confirmed an operation on that entry.
//! It is never replaced wholesale.

use crate::{CollectionName, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted content of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    /// Persisted parent id, for nested collections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RecordId>,
    /// Persisted content fields
    pub content: serde_json::Value,
}

impl SnapshotEntry {
    /// Create a new entry.
    pub fn new(parent: Option<RecordId>, content: serde_json::Value) -> Self {
        Self { parent, content }
    }
}

/// Clean baseline for the root document and every collection.
///
/// Uses BTreeMap so that iteration (and therefore diffs) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Persisted root document fields; `None` until the root exists remotely
    root: Option<serde_json::Value>,
    /// Entries organized by collection, then by record id
    collections: BTreeMap<CollectionName, BTreeMap<RecordId, SnapshotEntry>>,
}

impl Snapshot {
    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Persisted root document fields.
    pub fn root(&self) -> Option<&serde_json::Value> {
        self.root.as_ref()
    }

    /// Record confirmed root document fields.
    pub fn set_root(&mut self, fields: serde_json::Value) {
        self.root = Some(fields);
    }

    /// Record a confirmed entry, replacing any previous one.
    pub fn record(&mut self, collection: &str, id: impl Into<RecordId>, entry: SnapshotEntry) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.into(), entry);
    }

    /// Drop an entry after its delete was confirmed.
    pub fn forget(&mut self, collection: &str, id: &str) -> Option<SnapshotEntry> {
        self.collections.get_mut(collection)?.remove(id)
    }

    /// Get an entry.
    pub fn get(&self, collection: &str, id: &str) -> Option<&SnapshotEntry> {
        self.collections.get(collection)?.get(id)
    }

    /// Check if an entry exists.
    pub fn contains(&self, collection: &str, id: &str) -> bool {
        self.get(collection, id).is_some()
    }

    /// Entries of one collection, ordered by id.
    pub fn entries(&self, collection: &str) -> impl Iterator<Item = (&RecordId, &SnapshotEntry)> {
        self.collections.get(collection).into_iter().flatten()
    }

    /// Collection names that have (or had) entries.
    pub fn collection_names(&self) -> impl Iterator<Item = &CollectionName> {
        self.collections.keys()
    }

    /// Count entries across all collections.
    pub fn entry_count(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }
}
