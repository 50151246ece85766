//! Entity identities.
//!
//! An entity is identified either by a placeholder minted locally when it was
//! created, or by the id the remote store assigned when it accepted the
//! entity. The regime is part of the value: code matches on the variant and
//! never inspects the text of an id.
//!
//! The text form (`new-<token>` for provisional identities, the raw id
//! otherwise) exists only for boundaries such as logs and URL paths.

use crate::{error::Result, Error, RecordId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Prefix of the text form of a provisional identity.
pub const PROVISIONAL_PREFIX: &str = "new-";

/// Identity of a tracked entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identity {
    /// Locally minted placeholder; the entity has never been accepted remotely.
    Provisional(String),
    /// Id assigned by the remote store.
    Persisted(RecordId),
}

impl Identity {
    /// Create a provisional identity from a token.
    pub fn provisional(token: impl Into<String>) -> Self {
        Identity::Provisional(token.into())
    }

    /// Create a persisted identity.
    pub fn persisted(id: impl Into<RecordId>) -> Self {
        Identity::Persisted(id.into())
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, Identity::Provisional(_))
    }

    /// The remote id, if this identity is persisted.
    pub fn persisted_id(&self) -> Option<&RecordId> {
        match self {
            Identity::Persisted(id) => Some(id),
            Identity::Provisional(_) => None,
        }
    }

    /// Parse the text form produced by `Display`.
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(Error::InvalidIdentity(text.to_string()));
        }
        match text.strip_prefix(PROVISIONAL_PREFIX) {
            Some("") => Err(Error::InvalidIdentity(text.to_string())),
            Some(token) => Ok(Identity::Provisional(token.to_string())),
            None => Ok(Identity::Persisted(text.to_string())),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Provisional(token) => write!(f, "{PROVISIONAL_PREFIX}{token}"),
            Identity::Persisted(id) => f.write_str(id),
        }
    }
}

impl FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Identity::parse(s)
    }
}

impl From<RecordId> for Identity {
    fn from(id: RecordId) -> Self {
        Identity::Persisted(id)
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Identity::parse(&text).map_err(serde::de::Error::custom)
    }
}
