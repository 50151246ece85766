//! Per-entity outcomes of a save cycle.

use crate::{CollectionName, Identity, OpKind, RecordId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an entity's operation did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "camelCase")]
pub enum FailureReason {
    /// The remote store rejected the call (or it timed out).
    #[error("remote failure: {0}")]
    Remote(String),
    /// The parent's insert failed, so the child was not attempted.
    #[error("parent unresolved: {0}")]
    ParentUnresolved(Identity),
    /// The payload could not be built.
    #[error("invalid entity: {0}")]
    Invalid(String),
}

/// Status of one entity's operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum OutcomeStatus {
    Succeeded {
        /// Id assigned by an insert
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assigned: Option<RecordId>,
    },
    Failed {
        reason: FailureReason,
    },
}

/// Outcome of one planned operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityOutcome {
    /// Collection of the entity
    pub collection: CollectionName,
    /// Identity of the entity when the cycle was planned
    pub target: Identity,
    /// Operation kind
    pub kind: OpKind,
    /// What happened
    pub status: OutcomeStatus,
}

impl EntityOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }
}

/// A failed entity, as surfaced to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedEntity {
    pub collection: CollectionName,
    pub id: Identity,
    pub kind: OpKind,
    pub reason: FailureReason,
}

/// Overall verdict of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Every planned operation succeeded
    Success,
    /// At least one planned operation failed
    Partial,
}

/// Everything that happened in one execution of a save plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub outcomes: Vec<EntityOutcome>,
}

impl ExecutionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a success.
    pub fn succeeded(
        &mut self,
        collection: impl Into<CollectionName>,
        target: Identity,
        kind: OpKind,
        assigned: Option<RecordId>,
    ) {
        self.outcomes.push(EntityOutcome {
            collection: collection.into(),
            target,
            kind,
            status: OutcomeStatus::Succeeded { assigned },
        });
    }

    /// Record a failure.
    pub fn failed(
        &mut self,
        collection: impl Into<CollectionName>,
        target: Identity,
        kind: OpKind,
        reason: FailureReason,
    ) {
        self.outcomes.push(EntityOutcome {
            collection: collection.into(),
            target,
            kind,
            status: OutcomeStatus::Failed { reason },
        });
    }

    /// Success only if every planned operation succeeded.
    pub fn verdict(&self) -> Verdict {
        if self.outcomes.iter().all(EntityOutcome::is_success) {
            Verdict::Success
        } else {
            Verdict::Partial
        }
    }

    pub fn is_success(&self) -> bool {
        self.verdict() == Verdict::Success
    }

    /// Failed entities with their reasons.
    pub fn failures(&self) -> Vec<FailedEntity> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                OutcomeStatus::Failed { reason } => Some(FailedEntity {
                    collection: o.collection.clone(),
                    id: o.target.clone(),
                    kind: o.kind,
                    reason: reason.clone(),
                }),
                OutcomeStatus::Succeeded { .. } => None,
            })
            .collect()
    }

    /// Identity rewrites: provisional identity to assigned id.
    pub fn rewrites(&self) -> impl Iterator<Item = (&Identity, &RecordId)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            OutcomeStatus::Succeeded {
                assigned: Some(id),
            } => Some((&o.target, id)),
            _ => None,
        })
    }

    /// Find the outcome for an entity.
    pub fn outcome(&self, collection: &str, target: &Identity) -> Option<&EntityOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.collection == collection && &o.target == target)
    }

    /// Number of planned operations, attempted or not.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
