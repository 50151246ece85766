//! Entity tree - the in-memory document being edited.
//!
//! The tree holds the root document fields and one ordered collection of
//! entities per schema collection. It is the UI-owned side of the engine:
//! edits land here, and the engine only ever touches it to swap a
//! provisional identity for the persisted one after an insert.

use crate::{error::Result, CollectionName, Error, Identity, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A tracked entity in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Current identity
    pub id: Identity,
    /// Parent entity, for nested collections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Identity>,
    /// Content fields, without link fields
    pub content: serde_json::Value,
}

impl Entity {
    /// Create an entity.
    pub fn new(id: Identity, parent: Option<Identity>, content: serde_json::Value) -> Self {
        Self {
            id,
            parent,
            content,
        }
    }
}

/// The root document of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootDocument {
    /// Remote id; `None` while the document is a draft
    pub id: Option<RecordId>,
    /// Document fields
    pub fields: serde_json::Value,
}

/// The entity tree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTree {
    root: RootDocument,
    collections: BTreeMap<CollectionName, Vec<Entity>>,
    #[serde(skip)]
    next_token: u64,
    /// Provisional identities that have since been persisted, so that stale
    /// references from the UI still find their entity.
    #[serde(skip)]
    aliases: HashMap<Identity, RecordId>,
}

impl EntityTree {
    /// Create a tree with empty collections.
    pub fn new<I, N>(root: RootDocument, collections: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<CollectionName>,
    {
        Self {
            root,
            collections: collections
                .into_iter()
                .map(|name| (name.into(), Vec::new()))
                .collect(),
            next_token: 0,
            aliases: HashMap::new(),
        }
    }

    /// Get the root document.
    pub fn root(&self) -> &RootDocument {
        &self.root
    }

    /// Get the root document's remote id.
    pub fn root_id(&self) -> Option<&RecordId> {
        self.root.id.as_ref()
    }

    /// Record the remote id of a freshly created root document.
    pub fn set_root_id(&mut self, id: impl Into<RecordId>) {
        self.root.id = Some(id.into());
    }

    /// Replace the root document fields.
    pub fn set_root_fields(&mut self, fields: serde_json::Value) {
        self.root.fields = fields;
    }

    /// Collection names in the tree.
    pub fn collection_names(&self) -> impl Iterator<Item = &CollectionName> {
        self.collections.keys()
    }

    /// Entities of a collection, in order.
    pub fn entities(&self, collection: &str) -> Result<&[Entity]> {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))
    }

    /// Total number of entities across collections.
    pub fn len(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    /// Check if the tree has no entities.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Follow a provisional identity to its persisted replacement, if any.
    pub fn resolve(&self, id: &Identity) -> Identity {
        match self.aliases.get(id) {
            Some(persisted) => Identity::Persisted(persisted.clone()),
            None => id.clone(),
        }
    }

    /// Get an entity by identity.
    pub fn get(&self, collection: &str, id: &Identity) -> Option<&Entity> {
        let id = self.resolve(id);
        self.collections
            .get(collection)?
            .iter()
            .find(|e| e.id == id)
    }

    fn get_mut(&mut self, collection: &str, id: &Identity) -> Result<&mut Entity> {
        let id = self.resolve(id);
        self.collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::EntityNotFound {
                collection: collection.to_string(),
                id,
            })
    }

    /// Append an entity that already exists remotely.
    pub fn push_loaded(&mut self, collection: &str, entity: Entity) -> Result<()> {
        let entities = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;
        if entities.iter().any(|e| e.id == entity.id) {
            return Err(Error::DuplicateIdentity {
                collection: collection.to_string(),
                id: entity.id,
            });
        }
        entities.push(entity);
        Ok(())
    }

    /// Append a new entity under a fresh provisional identity.
    pub fn insert(
        &mut self,
        collection: &str,
        parent: Option<Identity>,
        content: serde_json::Value,
    ) -> Result<Identity> {
        let parent = parent.map(|p| self.resolve(&p));
        let entities = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        // Tokens are unique across the whole tree, not just per collection.
        self.next_token += 1;
        let id = Identity::Provisional(self.next_token.to_string());
        entities.push(Entity::new(id.clone(), parent, content));
        Ok(id)
    }

    /// Replace an entity's content.
    pub fn update(
        &mut self,
        collection: &str,
        id: &Identity,
        content: serde_json::Value,
    ) -> Result<()> {
        self.get_mut(collection, id)?.content = content;
        Ok(())
    }

    /// Move an entity under another parent.
    pub fn set_parent(&mut self, collection: &str, id: &Identity, parent: Identity) -> Result<()> {
        let parent = self.resolve(&parent);
        self.get_mut(collection, id)?.parent = Some(parent);
        Ok(())
    }

    /// Remove an entity. Children are not touched.
    pub fn remove(&mut self, collection: &str, id: &Identity) -> Result<Entity> {
        let id = self.resolve(id);
        let entities = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;
        let index = entities
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| Error::EntityNotFound {
                collection: collection.to_string(),
                id,
            })?;
        Ok(entities.remove(index))
    }

    /// Remove every entity of `collection` whose parent is `parent`.
    pub fn remove_children(&mut self, collection: &str, parent: &Identity) -> Vec<Entity> {
        let parent = self.resolve(parent);
        let Some(entities) = self.collections.get_mut(collection) else {
            return Vec::new();
        };
        let (removed, kept): (Vec<Entity>, Vec<Entity>) = std::mem::take(entities)
            .into_iter()
            .partition(|e| e.parent.as_ref() == Some(&parent));
        *entities = kept;
        removed
    }

    /// Swap a provisional identity for its persisted id.
    ///
    /// Rewrites the entity itself and every parent reference to it. Content
    /// is never touched. Returns `false` if the entity is no longer in the
    /// tree; the alias is recorded either way.
    pub fn rewrite_identity(
        &mut self,
        collection: &str,
        provisional: &Identity,
        persisted: &RecordId,
    ) -> bool {
        let replacement = Identity::Persisted(persisted.clone());
        self.aliases.insert(provisional.clone(), persisted.clone());

        for entity in self.collections.values_mut().flatten() {
            if entity.parent.as_ref() == Some(provisional) {
                entity.parent = Some(replacement.clone());
            }
        }

        match self
            .collections
            .get_mut(collection)
            .and_then(|c| c.iter_mut().find(|e| &e.id == provisional))
        {
            Some(entity) => {
                entity.id = replacement;
                true
            }
            None => false,
        }
    }
}
