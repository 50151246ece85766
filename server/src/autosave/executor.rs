//! Dependency-ordered execution of save plans.
//!
//! Each wave fans out to the remote store with `join_all` and fans back in
//! before the next wave starts. The workspace lock is taken only between
//! waves, to resolve payloads and to confirm what the store accepted; it is
//! never held while a call is in flight.

use std::sync::{Arc, Mutex};

use futures::future::join_all;
use quizdraft_engine::{
    ExecutionResult, FailureReason, Identity, IdentityMap, OpKind, Operation, PlannedDelete,
    PlannedWrite, RecordId, SavePlan, Workspace,
};
use serde_json::Value;

use crate::lock;
use crate::remote::{RemoteError, RemoteStore};

/// What to confirm in the workspace once a call succeeds.
enum Confirm<'p> {
    Root(&'p Value),
    Delete(&'p PlannedDelete),
    Write(&'p PlannedWrite, Option<RecordId>),
}

/// A resolved remote call for one entity.
struct PlannedCall<'p> {
    target: Identity,
    operation: Operation,
    confirm: Confirm<'p>,
}

/// Runs save plans against a remote store.
#[derive(Clone)]
pub struct Executor {
    store: Arc<dyn RemoteStore>,
}

impl Executor {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Execute a plan, confirming each accepted operation in the workspace.
    ///
    /// Failures are recorded per entity and never stop the cycle.
    pub async fn execute(
        &self,
        workspace: &Mutex<Workspace>,
        plan: &SavePlan,
        cycle: u64,
    ) -> ExecutionResult {
        let mut result = ExecutionResult::new();
        tracing::info!(cycle, operations = plan.len(), "Save cycle started");

        // Wave 0: child deletes, then parent deletes.
        for stage in &plan.deletes {
            let calls = stage
                .iter()
                .map(|delete| PlannedCall {
                    target: Identity::persisted(delete.id.clone()),
                    operation: delete.operation(),
                    confirm: Confirm::Delete(delete),
                })
                .collect();
            self.run_wave(workspace, 0, calls, &mut result).await;
        }

        // Wave 1: the root document and persisted entities.
        let mut calls = Vec::new();
        {
            let ws = lock(workspace);
            if let (Some(operation), Some(fields)) = (plan.root_operation(ws.schema()), &plan.root)
            {
                calls.push(PlannedCall {
                    target: Identity::persisted(plan.root_id.clone()),
                    operation,
                    confirm: Confirm::Root(fields),
                });
            }
            calls.extend(resolve(&ws, plan, &plan.updates, &IdentityMap::new(), &mut result));
        }
        self.run_wave(workspace, 1, calls, &mut result).await;

        // Wave 2: inserts that depend on nothing unsaved.
        let calls = resolve(
            &lock(workspace),
            plan,
            &plan.inserts,
            &IdentityMap::new(),
            &mut result,
        );
        let assigned = self.run_wave(workspace, 2, calls, &mut result).await;

        // Wave 3: children of wave 2 inserts.
        let calls = resolve(
            &lock(workspace),
            plan,
            &plan.dependents,
            &assigned,
            &mut result,
        );
        self.run_wave(workspace, 3, calls, &mut result).await;

        let failed = result.failures().len();
        if failed == 0 {
            tracing::info!(cycle, operations = result.len(), "Save cycle succeeded");
        } else {
            tracing::warn!(
                cycle,
                operations = result.len(),
                failed,
                "Save cycle finished with failures"
            );
        }
        result
    }

    /// Issue one wave concurrently and confirm the accepted calls.
    ///
    /// Returns the ids assigned by inserts in this wave.
    async fn run_wave(
        &self,
        workspace: &Mutex<Workspace>,
        wave: u8,
        calls: Vec<PlannedCall<'_>>,
        result: &mut ExecutionResult,
    ) -> IdentityMap {
        let mut assigned = IdentityMap::new();
        if calls.is_empty() {
            return assigned;
        }
        tracing::debug!(wave, calls = calls.len(), "Running wave");

        let responses = join_all(calls.iter().map(|call| self.send(&call.operation))).await;

        let mut ws = lock(workspace);
        for (call, response) in calls.into_iter().zip(responses) {
            let collection = call.operation.collection().clone();
            let kind = call.operation.kind();

            let response = match response {
                // Already gone is as good as deleted.
                Err(RemoteError::NotFound { .. }) if kind == OpKind::Delete => Ok(None),
                other => other,
            };
            let new_id = match response {
                Ok(new_id) => new_id,
                Err(e) => {
                    tracing::warn!(
                        wave,
                        collection = %collection,
                        entity = %call.target,
                        error = %e,
                        "Operation failed"
                    );
                    result.failed(collection, call.target, kind, FailureReason::Remote(e.to_string()));
                    continue;
                }
            };

            match call.confirm {
                Confirm::Root(fields) => ws.confirm_root(fields.clone()),
                Confirm::Delete(delete) => ws.confirm_delete(delete),
                Confirm::Write(write, parent) => {
                    match ws.confirm_write(write, parent, new_id.clone()) {
                        Ok(id) if new_id.is_some() => {
                            tracing::debug!(
                                collection = %collection,
                                entity = %call.target,
                                id = %id,
                                "Identity assigned"
                            );
                            assigned.insert(call.target.clone(), id);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            result.failed(
                                collection,
                                call.target,
                                kind,
                                FailureReason::Invalid(e.to_string()),
                            );
                            continue;
                        }
                    }
                }
            }
            result.succeeded(collection, call.target, kind, new_id);
        }

        assigned
    }

    async fn send(&self, operation: &Operation) -> Result<Option<RecordId>, RemoteError> {
        match operation {
            Operation::Insert(op) => self
                .store
                .insert(&op.collection, &op.payload)
                .await
                .map(|record| Some(record.id)),
            Operation::Update(op) => self
                .store
                .update(&op.collection, &op.id, &op.payload)
                .await
                .map(|_| None),
            Operation::Delete(op) => self
                .store
                .delete(&op.collection, &op.id)
                .await
                .map(|_| None),
        }
    }
}

/// Resolve planned writes; the ones that cannot be resolved fail right away.
fn resolve<'p>(
    ws: &Workspace,
    plan: &SavePlan,
    writes: &'p [PlannedWrite],
    assigned: &IdentityMap,
    result: &mut ExecutionResult,
) -> Vec<PlannedCall<'p>> {
    let mut calls = Vec::with_capacity(writes.len());
    for write in writes {
        match write.resolve(ws.schema(), &plan.root_id, assigned) {
            Ok(resolved) => calls.push(PlannedCall {
                target: write.target.clone(),
                operation: resolved.operation,
                confirm: Confirm::Write(write, resolved.parent),
            }),
            Err(reason) => {
                tracing::warn!(
                    collection = %write.collection,
                    entity = %write.target,
                    reason = %reason,
                    "Operation not attempted"
                );
                result.failed(write.collection.clone(), write.target.clone(), write.kind(), reason);
            }
        }
    }
    calls
}
