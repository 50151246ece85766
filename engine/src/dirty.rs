//! Dirty tracking.
//!
//! Compares the live entity tree with the snapshot and reports what would
//! have to be written for the remote store to match the tree. Pure: the same
//! tree and snapshot always give the same diff.
//!
//! # Rules
//!
//! - The root document is dirty if its fields differ (deep equality) from the
//!   snapshot's root fields.
//! - An entity with a provisional identity is always dirty.
//! - An entity with a persisted identity is dirty if its content or parent
//!   differs from its snapshot entry.
//! - A snapshot entry with no entity in the tree is deleted.
//!
//! Entities that were created and removed before any save never reach the
//! snapshot and are no longer in the tree, so they show up in neither set.

use crate::{CollectionName, Entity, EntityTree, Identity, RecordId, Snapshot, SnapshotEntry};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Result of comparing a tree with a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    /// Root document fields, if they changed
    pub root: Option<serde_json::Value>,
    /// Changed or never-persisted entities, by collection, in tree order
    pub dirty: BTreeMap<CollectionName, Vec<Entity>>,
    /// Persisted ids missing from the tree, by collection
    pub deleted: BTreeMap<CollectionName, Vec<RecordId>>,
}

impl Diff {
    /// Whether the root document changed.
    pub fn root_dirty(&self) -> bool {
        self.root.is_some()
    }

    /// Number of pending changes: the root (0 or 1) plus dirty and deleted
    /// entities.
    pub fn pending_changes(&self) -> usize {
        usize::from(self.root_dirty())
            + self.dirty.values().map(Vec::len).sum::<usize>()
            + self.deleted.values().map(Vec::len).sum::<usize>()
    }

    /// Check if nothing needs saving.
    pub fn is_empty(&self) -> bool {
        self.pending_changes() == 0
    }

    /// Check if an entity is reported dirty.
    pub fn is_dirty(&self, collection: &str, id: &Identity) -> bool {
        self.dirty
            .get(collection)
            .is_some_and(|entities| entities.iter().any(|e| &e.id == id))
    }

    /// Check if a persisted id is reported deleted.
    pub fn is_deleted(&self, collection: &str, id: &str) -> bool {
        self.deleted
            .get(collection)
            .is_some_and(|ids| ids.iter().any(|d| d == id))
    }
}

/// Compute the diff between a tree and a snapshot.
pub fn diff(tree: &EntityTree, snapshot: &Snapshot) -> Diff {
    let mut result = Diff::default();

    if snapshot.root() != Some(&tree.root().fields) {
        result.root = Some(tree.root().fields.clone());
    }

    for collection in tree.collection_names() {
        let Ok(entities) = tree.entities(collection) else {
            continue;
        };

        let dirty: Vec<Entity> = entities
            .iter()
            .filter(|entity| is_dirty(collection, entity, snapshot))
            .cloned()
            .collect();
        if !dirty.is_empty() {
            result.dirty.insert(collection.clone(), dirty);
        }
    }

    for collection in snapshot.collection_names() {
        let present: HashSet<&RecordId> = tree
            .entities(collection)
            .map(|entities| {
                entities
                    .iter()
                    .filter_map(|e| e.id.persisted_id())
                    .collect()
            })
            .unwrap_or_default();

        let deleted: Vec<RecordId> = snapshot
            .entries(collection)
            .filter(|(id, _)| !present.contains(id))
            .map(|(id, _)| id.clone())
            .collect();
        if !deleted.is_empty() {
            result.deleted.insert(collection.clone(), deleted);
        }
    }

    result
}

fn is_dirty(collection: &str, entity: &Entity, snapshot: &Snapshot) -> bool {
    let Identity::Persisted(id) = &entity.id else {
        return true;
    };
    match snapshot.get(collection, id) {
        Some(entry) => !matches_entry(entity, entry),
        None => true,
    }
}

fn matches_entry(entity: &Entity, entry: &SnapshotEntry) -> bool {
    let parent = match &entity.parent {
        None => None,
        Some(Identity::Persisted(id)) => Some(id),
        // A persisted entity moved under a new parent.
        Some(Identity::Provisional(_)) => return false,
    };
    parent == entry.parent.as_ref() && entity.content == entry.content
}
