//! Workspace - one document being edited.
//!
//! A workspace pairs the entity tree with its snapshot under one schema. All
//! mutations of the tree go through it so that payloads are validated and
//! link fields never leak into entity content. The confirmation methods are
//! the only way the snapshot changes after load.

use crate::{
    dirty, error::Result, CollectionName, Diff, Entity, EntityTree, Error, Identity,
    PlannedDelete, PlannedWrite, Record, RecordId, RootDocument, SavePlan, Schema, Snapshot,
    SnapshotEntry,
};
use std::collections::BTreeMap;

/// The tree and snapshot of one document.
#[derive(Debug, Clone)]
pub struct Workspace {
    schema: Schema,
    tree: EntityTree,
    snapshot: Snapshot,
}

impl Workspace {
    /// Start a document whose root does not exist remotely yet.
    pub fn draft(schema: Schema, fields: serde_json::Value) -> Result<Self> {
        schema.validate()?;
        schema.root.validate_payload(&fields)?;

        let tree = EntityTree::new(
            RootDocument { id: None, fields },
            schema.collections.keys().cloned(),
        );
        Ok(Self {
            schema,
            tree,
            snapshot: Snapshot::new(),
        })
    }

    /// Build a workspace from fetched records.
    ///
    /// Every fetched record becomes both a tree entity and a snapshot entry,
    /// so a freshly loaded workspace has an empty diff.
    pub fn load(
        schema: Schema,
        root: Record,
        mut records: BTreeMap<CollectionName, Vec<Record>>,
    ) -> Result<Self> {
        schema.validate()?;
        if let Some(unknown) = records.keys().find(|c| schema.get_collection(c).is_none()) {
            return Err(Error::CollectionNotFound(unknown.clone()));
        }

        let mut snapshot = Snapshot::new();
        snapshot.set_root(root.payload.clone());
        let mut tree = EntityTree::new(
            RootDocument {
                id: Some(root.id),
                fields: root.payload,
            },
            schema.collections.keys().cloned(),
        );

        for name in schema.load_order() {
            let parent_collection = schema
                .collection(name)?
                .parent
                .as_ref()
                .map(|link| link.collection.clone());

            for record in records.remove(name).unwrap_or_default() {
                let (owner, content) = schema.detach_link(name, record.payload)?;
                let parent = match &parent_collection {
                    Some(parent_collection) => {
                        let parent = Identity::Persisted(owner.clone());
                        if tree.get(parent_collection, &parent).is_none() {
                            return Err(Error::ParentNotFound {
                                collection: parent_collection.clone(),
                                id: parent,
                            });
                        }
                        Some(owner)
                    }
                    None => None,
                };

                tree.push_loaded(
                    name,
                    Entity::new(
                        Identity::Persisted(record.id.clone()),
                        parent.clone().map(Identity::Persisted),
                        content.clone(),
                    ),
                )?;
                snapshot.record(name, record.id, SnapshotEntry::new(parent, content));
            }
        }

        Ok(Self {
            schema,
            tree,
            snapshot,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn tree(&self) -> &EntityTree {
        &self.tree
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Remote id of the root document, once it exists.
    pub fn root_id(&self) -> Option<&RecordId> {
        self.tree.root_id()
    }

    /// Compare the tree with the snapshot.
    pub fn diff(&self) -> Diff {
        dirty::diff(&self.tree, &self.snapshot)
    }

    /// Number of unsaved changes.
    pub fn pending_changes(&self) -> usize {
        self.diff().pending_changes()
    }

    /// Plan the next save cycle from the current state.
    pub fn plan(&self) -> Result<SavePlan> {
        let root_id = self.root_id().ok_or(Error::RootNotPersisted)?;
        SavePlan::build(&self.schema, root_id.clone(), &self.diff())
    }

    // ---- mutations ----

    /// Replace the root document fields.
    pub fn set_root_fields(&mut self, fields: serde_json::Value) -> Result<()> {
        self.schema.root.validate_payload(&fields)?;
        self.tree.set_root_fields(fields);
        Ok(())
    }

    /// Create an entity. Children must name an existing parent.
    pub fn insert(
        &mut self,
        collection: &str,
        parent: Option<Identity>,
        content: serde_json::Value,
    ) -> Result<Identity> {
        let content = self.clean_content(collection, content)?;
        let parent = self.check_parent(collection, parent)?;
        self.tree.insert(collection, parent, content)
    }

    /// Replace an entity's content.
    pub fn update(
        &mut self,
        collection: &str,
        id: &Identity,
        content: serde_json::Value,
    ) -> Result<()> {
        let content = self.clean_content(collection, content)?;
        self.tree.update(collection, id, content)
    }

    /// Move a child entity under another parent in the same parent collection.
    pub fn reparent(&mut self, collection: &str, id: &Identity, parent: Identity) -> Result<()> {
        let parent = self.check_parent(collection, Some(parent))?;
        match parent {
            Some(parent) => self.tree.set_parent(collection, id, parent),
            None => Err(Error::InvalidPayload(format!(
                "{collection} is not a nested collection"
            ))),
        }
    }

    /// Remove an entity and its children. Returns how many entities were
    /// removed.
    pub fn remove(&mut self, collection: &str, id: &Identity) -> Result<usize> {
        self.schema.collection(collection)?;
        let removed = self.tree.remove(collection, id)?;

        let children: Vec<CollectionName> = self
            .schema
            .collections
            .values()
            .filter(|c| {
                c.parent
                    .as_ref()
                    .is_some_and(|link| link.collection == collection)
            })
            .map(|c| c.name.clone())
            .collect();

        let mut count = 1;
        for child in children {
            count += self.tree.remove_children(&child, &removed.id).len();
        }
        Ok(count)
    }

    fn clean_content(
        &self,
        collection: &str,
        mut content: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.schema.strip_link(collection, &mut content)?;
        self.schema.collection(collection)?.validate_payload(&content)?;
        Ok(content)
    }

    fn check_parent(
        &self,
        collection: &str,
        parent: Option<Identity>,
    ) -> Result<Option<Identity>> {
        let link = self.schema.collection(collection)?.parent.as_ref();
        match (link, parent) {
            (None, None) => Ok(None),
            (None, Some(_)) => Err(Error::InvalidPayload(format!(
                "{collection} is not a nested collection"
            ))),
            (Some(link), None) => Err(Error::MissingRequiredField(link.field.clone())),
            (Some(link), Some(parent)) => {
                let parent = self.tree.resolve(&parent);
                if self.tree.get(&link.collection, &parent).is_none() {
                    return Err(Error::ParentNotFound {
                        collection: link.collection.clone(),
                        id: parent,
                    });
                }
                Ok(Some(parent))
            }
        }
    }

    // ---- confirmations ----

    /// The root document was created remotely with `fields`.
    pub fn root_created(&mut self, id: impl Into<RecordId>, fields: serde_json::Value) {
        self.tree.set_root_id(id);
        self.snapshot.set_root(fields);
    }

    /// The root document update with `fields` was confirmed.
    pub fn confirm_root(&mut self, fields: serde_json::Value) {
        self.snapshot.set_root(fields);
    }

    /// A delete was confirmed.
    pub fn confirm_delete(&mut self, delete: &PlannedDelete) {
        self.snapshot.forget(&delete.collection, &delete.id);
    }

    /// A write was confirmed.
    ///
    /// Records the content that was sent (not whatever the tree holds now) and
    /// swaps in the assigned id for an insert. Returns the persisted id.
    pub fn confirm_write(
        &mut self,
        write: &PlannedWrite,
        parent: Option<RecordId>,
        assigned: Option<RecordId>,
    ) -> Result<RecordId> {
        let id = match (&write.target, assigned) {
            (Identity::Persisted(id), _) => id.clone(),
            (Identity::Provisional(_), Some(assigned)) => {
                self.tree
                    .rewrite_identity(&write.collection, &write.target, &assigned);
                assigned
            }
            (Identity::Provisional(_), None) => {
                return Err(Error::InvalidIdentity(write.target.to_string()))
            }
        };
        self.snapshot.record(
            &write.collection,
            id.clone(),
            SnapshotEntry::new(parent, write.content.clone()),
        );
        Ok(id)
    }
}
