//! # Quizdraft Engine
//!
//! Incremental autosave reconciliation for a document editor.
//!
//! The engine keeps an in-memory tree of entities (a root document plus
//! collections hanging off it), remembers what was last confirmed by the
//! remote store, and works out the smallest set of remote operations that
//! brings the store up to date. It is deterministic: the same tree and
//! snapshot always produce the same plan.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never talks to the remote store itself; the
//!   server crate executes plans and reports back
//! - **Deterministic**: ordered maps everywhere, so diffs and plans are stable
//! - **Testable**: pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Identities
//!
//! An [`Identity`] is either provisional (minted locally when the entity was
//! created) or persisted (assigned by the remote store). Children of an
//! unsaved parent point at its provisional identity until the parent's insert
//! is confirmed.
//!
//! ### Snapshot and diff
//!
//! The [`Snapshot`] is the last state known to be persisted. [`diff`] compares
//! it with the [`EntityTree`] and reports dirty and deleted entities.
//!
//! ### Save plans
//!
//! A [`SavePlan`] groups the diff into waves: deletes, updates, inserts, then
//! writes that depend on an insert from the same cycle.
//!
//! ### Status
//!
//! [`StatusMachine`] tracks idle / pending / saving / saved / error.
//!
//! ## Quick Start
//!
//! ```rust
//! use quizdraft_engine::{
//!     CollectionSchema, FieldDef, FieldType, Identity, Record, Schema, Workspace,
//! };
//! use serde_json::json;
//! use std::collections::BTreeMap;
//!
//! let schema = Schema::new(
//!     CollectionSchema::new("quizzes", vec![FieldDef::required("title", FieldType::String)]),
//!     "quiz_id",
//! )
//! .with_collection(CollectionSchema::new("questions", vec![]))
//! .with_collection(CollectionSchema::new("answers", vec![]).child_of("questions", "question_id"));
//!
//! let mut ws = Workspace::load(
//!     schema,
//!     Record::new("quiz-1", json!({"title": "Capitals"})),
//!     BTreeMap::new(),
//! )
//! .unwrap();
//!
//! let question = ws.insert("questions", None, json!({"text": "France?"})).unwrap();
//! ws.insert("answers", Some(question.clone()), json!({"text": "Paris"})).unwrap();
//!
//! let plan = ws.plan().unwrap();
//! assert_eq!(plan.inserts.len(), 1);
//! assert_eq!(plan.dependents.len(), 1);
//! assert_eq!(question, Identity::provisional("1"));
//! ```

pub mod dirty;
pub mod error;
pub mod identity;
pub mod operation;
pub mod outcome;
pub mod plan;
pub mod record;
pub mod schema;
pub mod snapshot;
pub mod status;
pub mod tree;
pub mod workspace;

// Re-export main types at crate root
pub use dirty::{diff, Diff};
pub use error::Error;
pub use identity::{Identity, PROVISIONAL_PREFIX};
pub use operation::{DeleteOp, InsertOp, OpKind, Operation, UpdateOp};
pub use outcome::{
    EntityOutcome, ExecutionResult, FailedEntity, FailureReason, OutcomeStatus, Verdict,
};
pub use plan::{IdentityMap, PlannedDelete, PlannedWrite, ResolvedWrite, SavePlan};
pub use record::Record;
pub use schema::{CollectionSchema, FieldDef, FieldType, ParentLink, Schema};
pub use snapshot::{Snapshot, SnapshotEntry};
pub use status::{SaveState, StatusMachine, StatusReport};
pub use tree::{Entity, EntityTree, RootDocument};
pub use workspace::Workspace;

/// Type aliases for clarity
pub type RecordId = String;
pub type CollectionName = String;
