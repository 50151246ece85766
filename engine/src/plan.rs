//! Save plans.
//!
//! A save plan turns a [`Diff`] into remote operations grouped in waves. The
//! dependency graph is at most two levels deep (parent collections and their
//! children), so two passes over the provisional entities are enough.
//!
//! # Waves
//!
//! 0. Deletes, children before parents. Each stage completes before the next.
//! 1. Updates of persisted entities, plus the root document.
//! 2. Inserts of provisional entities whose parent (if any) is persisted.
//! 3. Writes of entities whose parent was provisional at planning time. Their
//!    parent reference is resolved through the ids assigned in wave 2; a child
//!    whose parent failed is not attempted.

use crate::{
    error::Result, CollectionName, DeleteOp, Diff, Entity, Error, FailureReason, Identity,
    InsertOp, OpKind, Operation, RecordId, Schema, UpdateOp,
};
use serde::Serialize;
use std::collections::HashMap;

/// Ids assigned by inserts in the current cycle, keyed by provisional identity.
pub type IdentityMap = HashMap<Identity, RecordId>;

/// A delete of a persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedDelete {
    pub collection: CollectionName,
    pub id: RecordId,
}

impl PlannedDelete {
    pub fn operation(&self) -> Operation {
        Operation::Delete(DeleteOp::new(self.collection.clone(), self.id.clone()))
    }
}

/// An insert or update of one entity, captured at planning time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedWrite {
    pub collection: CollectionName,
    /// Identity of the entity when the plan was built
    pub target: Identity,
    pub parent: Option<Identity>,
    pub content: serde_json::Value,
}

/// A write whose ids are all persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWrite {
    pub operation: Operation,
    /// Persisted parent id, for the snapshot entry
    pub parent: Option<RecordId>,
}

impl PlannedWrite {
    fn from_entity(collection: &str, entity: &Entity) -> Self {
        Self {
            collection: collection.to_string(),
            target: entity.id.clone(),
            parent: entity.parent.clone(),
            content: entity.content.clone(),
        }
    }

    /// Insert for a provisional target, update otherwise.
    pub fn kind(&self) -> OpKind {
        match self.target {
            Identity::Provisional(_) => OpKind::Insert,
            Identity::Persisted(_) => OpKind::Update,
        }
    }

    /// Whether this write must wait for its parent's insert.
    pub fn depends_on_insert(&self) -> bool {
        self.parent.as_ref().is_some_and(Identity::is_provisional)
    }

    /// Build the remote operation, resolving a provisional parent through
    /// `assigned`.
    pub fn resolve(
        &self,
        schema: &Schema,
        root_id: &str,
        assigned: &IdentityMap,
    ) -> std::result::Result<ResolvedWrite, FailureReason> {
        let invalid = |e: Error| FailureReason::Invalid(e.to_string());

        let parent = match &self.parent {
            None => None,
            Some(Identity::Persisted(id)) => Some(id.clone()),
            Some(provisional) => Some(
                assigned
                    .get(provisional)
                    .cloned()
                    .ok_or_else(|| FailureReason::ParentUnresolved(provisional.clone()))?,
            ),
        };

        let nested = schema.depth(&self.collection).map_err(invalid)? > 0;
        let owner = match (&parent, nested) {
            (Some(parent), true) => parent.as_str(),
            (None, false) => root_id,
            (None, true) => {
                return Err(FailureReason::Invalid(format!(
                    "{} in {} has no parent",
                    self.target, self.collection
                )))
            }
            (Some(_), false) => {
                return Err(FailureReason::Invalid(format!(
                    "{} is not a nested collection",
                    self.collection
                )))
            }
        };
        let payload = schema
            .attach_link(&self.collection, &self.content, owner)
            .map_err(invalid)?;

        let operation = match &self.target {
            Identity::Persisted(id) => {
                Operation::Update(UpdateOp::new(self.collection.clone(), id.clone(), payload))
            }
            Identity::Provisional(_) => {
                Operation::Insert(InsertOp::new(self.collection.clone(), payload))
            }
        };

        Ok(ResolvedWrite { operation, parent })
    }
}

/// Operations for one save cycle, grouped by wave.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePlan {
    /// Root document id
    pub root_id: RecordId,
    /// Root document fields to write in wave 1
    pub root: Option<serde_json::Value>,
    /// Wave 0: delete stages, deepest collections first
    pub deletes: Vec<Vec<PlannedDelete>>,
    /// Wave 1: updates of persisted entities
    pub updates: Vec<PlannedWrite>,
    /// Wave 2: inserts without a pending parent
    pub inserts: Vec<PlannedWrite>,
    /// Wave 3: writes waiting on a wave 2 insert
    pub dependents: Vec<PlannedWrite>,
}

impl SavePlan {
    /// Build the plan for a diff.
    pub fn build(schema: &Schema, root_id: impl Into<RecordId>, diff: &Diff) -> Result<Self> {
        let mut plan = SavePlan {
            root_id: root_id.into(),
            root: diff.root.clone(),
            deletes: Vec::new(),
            updates: Vec::new(),
            inserts: Vec::new(),
            dependents: Vec::new(),
        };

        let mut nested_deletes = Vec::new();
        let mut top_deletes = Vec::new();
        for (collection, ids) in &diff.deleted {
            let stage = match schema.depth(collection)? {
                0 => &mut top_deletes,
                _ => &mut nested_deletes,
            };
            stage.extend(ids.iter().map(|id| PlannedDelete {
                collection: collection.clone(),
                id: id.clone(),
            }));
        }
        plan.deletes = [nested_deletes, top_deletes]
            .into_iter()
            .filter(|stage| !stage.is_empty())
            .collect();

        for (collection, entities) in &diff.dirty {
            schema.collection(collection)?;
            for entity in entities {
                let write = PlannedWrite::from_entity(collection, entity);
                if write.depends_on_insert() {
                    plan.dependents.push(write);
                } else if write.target.is_provisional() {
                    plan.inserts.push(write);
                } else {
                    plan.updates.push(write);
                }
            }
        }

        Ok(plan)
    }

    /// The root document update, if the root changed.
    pub fn root_operation(&self, schema: &Schema) -> Option<Operation> {
        self.root.as_ref().map(|fields| {
            Operation::Update(UpdateOp::new(
                schema.root.name.clone(),
                self.root_id.clone(),
                fields.clone(),
            ))
        })
    }

    /// Total number of planned operations.
    pub fn len(&self) -> usize {
        usize::from(self.root.is_some())
            + self.deletes.iter().map(Vec::len).sum::<usize>()
            + self.updates.len()
            + self.inserts.len()
            + self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
