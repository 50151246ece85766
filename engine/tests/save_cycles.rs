//! Save cycles driven against a scripted remote
//!
//! These tests run whole cycles through the engine: plan, resolve each wave,
//! confirm what the remote accepted. The remote is a plain map that assigns
//! sequential ids and rejects whatever the test tells it to.

use quizdraft_engine::{
    CollectionSchema, ExecutionResult, FailureReason, FieldDef, FieldType, Identity, IdentityMap,
    OpKind, Operation, Record, SavePlan, Schema, Verdict, Workspace,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};

fn quiz_schema() -> Schema {
    Schema::new(
        CollectionSchema::new("quizzes", vec![FieldDef::required("title", FieldType::String)]),
        "quiz_id",
    )
    .with_collection(CollectionSchema::new(
        "questions",
        vec![FieldDef::required("text", FieldType::String)],
    ))
    .with_collection(
        CollectionSchema::new(
            "answers",
            vec![
                FieldDef::required("text", FieldType::String),
                FieldDef::optional("correct", FieldType::Bool),
            ],
        )
        .child_of("questions", "question_id"),
    )
}

#[derive(Default)]
struct ScriptedRemote {
    next_id: u32,
    /// Every call, in order
    calls: Vec<Operation>,
    /// Targets (planned identities) whose operation is rejected
    reject: HashSet<Identity>,
}

impl ScriptedRemote {
    fn call(&mut self, op: Operation, target: &Identity) -> Result<Option<String>, String> {
        self.calls.push(op.clone());
        if self.reject.contains(target) {
            return Err("rejected".into());
        }
        Ok(match op {
            Operation::Insert(_) => {
                self.next_id += 1;
                Some(format!("R{}", self.next_id))
            }
            _ => None,
        })
    }

    fn payloads(&self) -> Vec<&Value> {
        self.calls.iter().filter_map(Operation::payload).collect()
    }
}

fn run_cycle(ws: &mut Workspace, remote: &mut ScriptedRemote) -> ExecutionResult {
    let plan: SavePlan = ws.plan().unwrap();
    let mut result = ExecutionResult::new();

    for stage in &plan.deletes {
        for delete in stage {
            let target = Identity::persisted(delete.id.clone());
            match remote.call(delete.operation(), &target) {
                Ok(_) => {
                    ws.confirm_delete(delete);
                    result.succeeded(&delete.collection, target, OpKind::Delete, None);
                }
                Err(e) => result.failed(
                    &delete.collection,
                    target,
                    OpKind::Delete,
                    FailureReason::Remote(e),
                ),
            }
        }
    }

    if let (Some(op), Some(fields)) = (plan.root_operation(ws.schema()), plan.root.clone()) {
        let target = Identity::persisted(plan.root_id.clone());
        match remote.call(op, &target) {
            Ok(_) => {
                ws.confirm_root(fields);
                result.succeeded("quizzes", target, OpKind::Update, None);
            }
            Err(e) => result.failed("quizzes", target, OpKind::Update, FailureReason::Remote(e)),
        }
    }

    let mut assigned = IdentityMap::new();
    for wave in [&plan.updates, &plan.inserts, &plan.dependents] {
        for write in wave {
            let resolved = match write.resolve(ws.schema(), &plan.root_id, &assigned) {
                Ok(resolved) => resolved,
                Err(reason) => {
                    let kind = if write.target.is_provisional() {
                        OpKind::Insert
                    } else {
                        OpKind::Update
                    };
                    result.failed(&write.collection, write.target.clone(), kind, reason);
                    continue;
                }
            };
            let kind = resolved.operation.kind();
            match remote.call(resolved.operation, &write.target) {
                Ok(new_id) => {
                    if let Some(id) = &new_id {
                        assigned.insert(write.target.clone(), id.clone());
                    }
                    ws.confirm_write(write, resolved.parent, new_id.clone())
                        .unwrap();
                    result.succeeded(&write.collection, write.target.clone(), kind, new_id);
                }
                Err(e) => result.failed(
                    &write.collection,
                    write.target.clone(),
                    kind,
                    FailureReason::Remote(e),
                ),
            }
        }
    }

    result
}

fn loaded() -> Workspace {
    Workspace::load(
        quiz_schema(),
        Record::new("quiz-1", json!({"title": "Capitals"})),
        BTreeMap::from([
            (
                "questions".to_string(),
                vec![Record::new(
                    "Q1",
                    json!({"text": "Capital of France?", "quiz_id": "quiz-1"}),
                )],
            ),
            (
                "answers".to_string(),
                vec![
                    Record::new("A1", json!({"text": "Paris", "question_id": "Q1"})),
                    Record::new("A9", json!({"text": "Lyon", "question_id": "Q1"})),
                ],
            ),
        ]),
    )
    .unwrap()
}

#[test]
fn new_question_with_answer_and_a_delete() {
    let mut ws = loaded();
    let mut remote = ScriptedRemote::default();

    let question = ws
        .insert("questions", None, json!({"text": "Capital of Spain?"}))
        .unwrap();
    assert_eq!(question.to_string(), "new-1");
    ws.insert("answers", Some(question.clone()), json!({"text": "Madrid"}))
        .unwrap();
    ws.remove("answers", &Identity::persisted("A9")).unwrap();

    let result = run_cycle(&mut ws, &mut remote);
    assert_eq!(result.verdict(), Verdict::Success);
    assert_eq!(result.len(), 3);

    // Delete first, then the question, then its answer.
    assert_eq!(remote.calls[0].kind(), OpKind::Delete);
    assert_eq!(remote.calls[1].collection(), "questions");
    assert_eq!(remote.calls[2].collection(), "answers");
    assert_eq!(remote.calls[2].payload().unwrap()["question_id"], "R1");

    // The provisional string never reaches the remote.
    for payload in remote.payloads() {
        assert!(!payload.to_string().contains("new-"));
    }

    let snapshot = ws.snapshot();
    assert!(snapshot.contains("questions", "R1"));
    assert_eq!(snapshot.get("answers", "R2").unwrap().parent.as_deref(), Some("R1"));
    assert!(!snapshot.contains("answers", "A9"));
    assert!(snapshot.contains("questions", "Q1"));

    assert!(ws.tree().get("questions", &Identity::persisted("R1")).is_some());
    assert_eq!(ws.pending_changes(), 0);
}

#[test]
fn partial_failure_keeps_failed_entity_dirty() {
    let mut ws = loaded();
    let mut remote = ScriptedRemote::default();
    let a1 = Identity::persisted("A1");
    let q1 = Identity::persisted("Q1");

    ws.update("answers", &a1, json!({"text": "Paris!"})).unwrap();
    ws.update("questions", &q1, json!({"text": "France?"})).unwrap();
    remote.reject.insert(a1.clone());

    let result = run_cycle(&mut ws, &mut remote);
    assert_eq!(result.verdict(), Verdict::Partial);
    let failures = result.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].id, a1);

    let snapshot = ws.snapshot();
    assert_eq!(snapshot.get("questions", "Q1").unwrap().content, json!({"text": "France?"}));
    assert_eq!(snapshot.get("answers", "A1").unwrap().content, json!({"text": "Paris"}));

    let diff = ws.diff();
    assert!(diff.is_dirty("answers", &a1));
    assert!(!diff.is_dirty("questions", &q1));

    // The retry only touches the failed entity.
    remote.reject.clear();
    remote.calls.clear();
    let retry = run_cycle(&mut ws, &mut remote);
    assert!(retry.is_success());
    assert_eq!(remote.calls.len(), 1);
    assert_eq!(ws.pending_changes(), 0);
}

#[test]
fn failed_parent_leaves_child_unattempted() {
    let mut ws = loaded();
    let mut remote = ScriptedRemote::default();

    let question = ws
        .insert("questions", None, json!({"text": "Capital of Italy?"}))
        .unwrap();
    let answer = ws
        .insert("answers", Some(question.clone()), json!({"text": "Rome"}))
        .unwrap();
    remote.reject.insert(question.clone());

    let result = run_cycle(&mut ws, &mut remote);
    assert_eq!(result.verdict(), Verdict::Partial);
    assert_eq!(remote.calls.len(), 1);

    let child = result.outcome("answers", &answer).unwrap();
    assert!(!child.is_success());
    assert_eq!(
        result.failures()[1].reason,
        FailureReason::ParentUnresolved(question.clone())
    );

    // Both stay provisional and dirty; the next cycle inserts them once.
    remote.reject.clear();
    let retry = run_cycle(&mut ws, &mut remote);
    assert!(retry.is_success());
    let inserts = remote
        .calls
        .iter()
        .filter(|op| op.kind() == OpKind::Insert)
        .count();
    assert_eq!(inserts, 3);
    assert_eq!(ws.pending_changes(), 0);
}

#[test]
fn created_then_removed_costs_nothing() {
    let mut ws = loaded();
    let mut remote = ScriptedRemote::default();

    let question = ws
        .insert("questions", None, json!({"text": "Capital of Peru?"}))
        .unwrap();
    ws.insert("answers", Some(question.clone()), json!({"text": "Lima"}))
        .unwrap();
    ws.remove("questions", &question).unwrap();

    let result = run_cycle(&mut ws, &mut remote);
    assert!(result.is_empty());
    assert!(remote.calls.is_empty());
}

#[test]
fn edits_during_cycle_go_to_the_next_one() {
    let mut ws = loaded();
    let q1 = Identity::persisted("Q1");
    ws.update("questions", &q1, json!({"text": "v1"})).unwrap();

    let plan = ws.plan().unwrap();
    // The user keeps typing while the update is in flight.
    ws.update("questions", &q1, json!({"text": "v2"})).unwrap();

    let resolved = plan.updates[0]
        .resolve(ws.schema(), &plan.root_id, &IdentityMap::new())
        .unwrap();
    assert_eq!(resolved.operation.payload().unwrap()["text"], "v1");
    ws.confirm_write(&plan.updates[0], resolved.parent, None)
        .unwrap();

    let next = ws.plan().unwrap();
    assert_eq!(next.updates.len(), 1);
    assert_eq!(next.updates[0].content, json!({"text": "v2"}));
}

#[test]
fn parent_removed_while_its_insert_was_in_flight() {
    let mut ws = loaded();
    let mut remote = ScriptedRemote::default();
    let question = ws
        .insert("questions", None, json!({"text": "Capital of Chile?"}))
        .unwrap();

    let plan = ws.plan().unwrap();
    ws.remove("questions", &question).unwrap();

    let write = &plan.inserts[0];
    let resolved = write
        .resolve(ws.schema(), &plan.root_id, &IdentityMap::new())
        .unwrap();
    let id = remote.call(resolved.operation, &write.target).unwrap();
    ws.confirm_write(write, None, id).unwrap();

    // The remote has a record the user no longer wants; the next cycle removes it.
    let next = ws.plan().unwrap();
    assert_eq!(next.deletes.len(), 1);
    assert_eq!(next.deletes[0][0].id, "R1");
}

#[test]
fn root_and_entities_in_one_cycle() {
    let mut ws = loaded();
    let mut remote = ScriptedRemote::default();
    ws.set_root_fields(json!({"title": "European capitals"}))
        .unwrap();

    let result = run_cycle(&mut ws, &mut remote);
    assert!(result.is_success());
    assert_eq!(remote.calls.len(), 1);
    assert_eq!(
        remote.calls[0].payload(),
        Some(&json!({"title": "European capitals"}))
    );
    assert_eq!(ws.snapshot().root(), Some(&json!({"title": "European capitals"})));
}

#[test]
fn unicode_content_round_trips_through_snapshot() {
    let mut ws = loaded();
    let mut remote = ScriptedRemote::default();
    let text = "Столица Японии? 日本の首都 🎌";
    let question = ws.insert("questions", None, json!({"text": text})).unwrap();

    run_cycle(&mut ws, &mut remote);
    let saved = ws.tree().get("questions", &question).unwrap();
    assert_eq!(saved.content["text"], text);
    assert_eq!(ws.pending_changes(), 0);
}
