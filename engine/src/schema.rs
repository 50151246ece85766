//! Schema definition and validation.
//!
//! A schema describes the root document collection and the collections that
//! hang off it. Child collections point at a parent collection through a link
//! field (`answers.question_id`); top-level collections point at the root
//! document through the schema's root field (`questions.quiz_id`).
//!
//! Link fields are owned by the engine. They are stripped from entity content
//! when records are loaded or edited, and attached again when a remote
//! payload is built, so that content comparison never sees them.

use crate::{error::Result, CollectionName, Error, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Value kinds a content field may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    /// RFC 3339 date-time string
    Timestamp,
    /// Any JSON value, stored as-is (media, styling, translation tables)
    Json,
}

impl FieldType {
    /// Name used in serialized schemas and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::Timestamp => "timestamp",
            FieldType::Json => "json",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Timestamp => value
                .as_str()
                .is_some_and(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok()),
            FieldType::Json => true,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named content field of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    /// Absent and null values are rejected when set
    pub required: bool,
}

impl FieldDef {
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    /// Check one content value. Null counts as absent.
    pub fn validate(&self, value: Option<&Value>) -> Result<()> {
        match value.filter(|v| !v.is_null()) {
            None if self.required => Err(Error::MissingRequiredField(self.name.clone())),
            None => Ok(()),
            Some(v) if self.field_type.accepts(v) => Ok(()),
            Some(v) => Err(mismatch(&self.name, self.field_type, v)),
        }
    }
}

fn mismatch(field: &str, expected: FieldType, got: &Value) -> Error {
    let got = match got {
        Value::String(_) if expected == FieldType::Timestamp => "non-RFC 3339 string",
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    Error::TypeMismatch {
        field: field.to_string(),
        expected: expected.to_string(),
        got: got.to_string(),
    }
}

/// Link from a child collection to its parent collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentLink {
    /// Parent collection name
    pub collection: CollectionName,
    /// Field on the child that holds the parent's id
    pub field: String,
}

/// Schema for a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    /// Collection name
    pub name: CollectionName,
    /// Field definitions
    pub fields: Vec<FieldDef>,
    /// Parent collection, for nested collections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentLink>,
}

impl CollectionSchema {
    /// Create a new collection schema.
    pub fn new(name: impl Into<CollectionName>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
            parent: None,
        }
    }

    /// Builder-style method to nest this collection under a parent collection.
    pub fn child_of(
        mut self,
        collection: impl Into<CollectionName>,
        field: impl Into<String>,
    ) -> Self {
        self.parent = Some(ParentLink {
            collection: collection.into(),
            field: field.into(),
        });
        self
    }

    /// Check entity content against the collection's fields. Unknown keys
    /// pass through untouched.
    pub fn validate_payload(&self, content: &Value) -> Result<()> {
        let Some(obj) = content.as_object() else {
            return Err(Error::InvalidPayload(format!(
                "{} content must be an object",
                self.name
            )));
        };
        self.fields
            .iter()
            .try_for_each(|field| field.validate(obj.get(&field.name)))
    }
}

/// Schema for a root document and its collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Root document collection
    pub root: CollectionSchema,
    /// Field on top-level collections that holds the root document's id
    pub root_field: String,
    /// Non-root collection schemas by name
    pub collections: BTreeMap<CollectionName, CollectionSchema>,
}

impl Schema {
    /// Create a new schema around a root collection.
    pub fn new(root: CollectionSchema, root_field: impl Into<String>) -> Self {
        Self {
            root,
            root_field: root_field.into(),
            collections: BTreeMap::new(),
        }
    }

    pub fn with_collection(mut self, collection: CollectionSchema) -> Self {
        self.collections.insert(collection.name.clone(), collection);
        self
    }

    pub fn get_collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }

    /// Get a collection schema by name, or fail.
    pub fn collection(&self, name: &str) -> Result<&CollectionSchema> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    /// Check structural rules: parents exist, are not the root, and are not
    /// themselves nested.
    pub fn validate(&self) -> Result<()> {
        if self.collections.contains_key(&self.root.name) {
            return Err(Error::InvalidSchema(format!(
                "root collection '{}' is also listed as a child collection",
                self.root.name
            )));
        }

        for collection in self.collections.values() {
            let Some(link) = &collection.parent else {
                continue;
            };
            if link.collection == collection.name {
                return Err(Error::InvalidSchema(format!(
                    "collection '{}' cannot be its own parent",
                    collection.name
                )));
            }
            let parent = self.collections.get(&link.collection).ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "collection '{}' names unknown parent '{}'",
                    collection.name, link.collection
                ))
            })?;
            if parent.parent.is_some() {
                return Err(Error::InvalidSchema(format!(
                    "collection '{}' nests more than two levels deep",
                    collection.name
                )));
            }
        }

        Ok(())
    }

    /// Nesting depth of a collection: 0 for top-level, 1 for children.
    pub fn depth(&self, name: &str) -> Result<usize> {
        Ok(match self.collection(name)?.parent {
            Some(_) => 1,
            None => 0,
        })
    }

    /// Collection names with parents before their children.
    pub fn load_order(&self) -> Vec<&CollectionName> {
        let (top, nested): (Vec<_>, Vec<_>) = self
            .collections
            .values()
            .partition(|c| c.parent.is_none());
        top.into_iter().chain(nested).map(|c| &c.name).collect()
    }

    /// Name of the field that links a collection's records to their owner.
    pub fn link_field(&self, name: &str) -> Result<&str> {
        Ok(match &self.collection(name)?.parent {
            Some(link) => link.field.as_str(),
            None => self.root_field.as_str(),
        })
    }

    /// Remove the link field from content, if present.
    pub fn strip_link(&self, name: &str, content: &mut Value) -> Result<()> {
        let field = self.link_field(name)?;
        if let Some(obj) = content.as_object_mut() {
            obj.remove(field);
        }
        Ok(())
    }

    /// Split a remote payload into the owner id and the content.
    pub fn detach_link(&self, name: &str, mut payload: Value) -> Result<(RecordId, Value)> {
        let field = self.link_field(name)?;
        let obj = payload
            .as_object_mut()
            .ok_or_else(|| Error::InvalidPayload(format!("{name} payload must be an object")))?;
        let owner = match obj.remove(field) {
            Some(Value::String(id)) => id,
            Some(other) => return Err(mismatch(field, FieldType::String, &other)),
            None => return Err(Error::MissingRequiredField(field.to_string())),
        };
        Ok((owner, payload))
    }

    /// Build the remote payload for content owned by `owner`.
    pub fn attach_link(&self, name: &str, content: &Value, owner: &str) -> Result<Value> {
        let field = self.link_field(name)?;
        let mut payload = content.clone();
        let obj = payload
            .as_object_mut()
            .ok_or_else(|| Error::InvalidPayload(format!("{name} payload must be an object")))?;
        obj.insert(field.to_string(), Value::String(owner.to_string()));
        Ok(payload)
    }
}
