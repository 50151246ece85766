//! Performance benchmarks for quizdraft-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quizdraft_engine::{
    diff, CollectionSchema, FieldDef, FieldType, Identity, Record, Schema, Workspace,
};
use serde_json::json;
use std::collections::BTreeMap;

fn create_test_schema() -> Schema {
    Schema::new(
        CollectionSchema::new("quizzes", vec![FieldDef::required("title", FieldType::String)]),
        "quiz_id",
    )
    .with_collection(CollectionSchema::new(
        "questions",
        vec![
            FieldDef::required("text", FieldType::String),
            FieldDef::optional("position", FieldType::Int),
        ],
    ))
    .with_collection(
        CollectionSchema::new("answers", vec![FieldDef::required("text", FieldType::String)])
            .child_of("questions", "question_id"),
    )
}

/// A quiz with `size` questions, four answers each.
fn loaded_workspace(size: usize) -> Workspace {
    let questions = (0..size)
        .map(|i| {
            Record::new(
                format!("Q{i}"),
                json!({"text": format!("Question {i}"), "position": i, "quiz_id": "quiz-1"}),
            )
        })
        .collect();
    let answers = (0..size * 4)
        .map(|i| {
            Record::new(
                format!("A{i}"),
                json!({"text": format!("Answer {i}"), "question_id": format!("Q{}", i / 4)}),
            )
        })
        .collect();

    Workspace::load(
        create_test_schema(),
        Record::new("quiz-1", json!({"title": "Benchmark"})),
        BTreeMap::from([
            ("questions".to_string(), questions),
            ("answers".to_string(), answers),
        ]),
    )
    .unwrap()
}

/// Touch roughly a tenth of the tree: edits, new entities, removals.
fn edit_workspace(ws: &mut Workspace, size: usize) {
    for i in (0..size).step_by(10) {
        ws.update(
            "questions",
            &Identity::persisted(format!("Q{i}")),
            json!({"text": format!("Edited {i}"), "position": i}),
        )
        .unwrap();
        ws.remove("answers", &Identity::persisted(format!("A{}", i * 4)))
            .unwrap();
        let q = ws
            .insert("questions", None, json!({"text": "New"}))
            .unwrap();
        ws.insert("answers", Some(q), json!({"text": "New answer"}))
            .unwrap();
    }
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");

    for size in [10, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::new("clean", size), size, |b, &size| {
            let ws = loaded_workspace(size);
            b.iter(|| diff(black_box(ws.tree()), black_box(ws.snapshot())))
        });

        group.bench_with_input(BenchmarkId::new("edited", size), size, |b, &size| {
            let mut ws = loaded_workspace(size);
            edit_workspace(&mut ws, size);
            b.iter(|| diff(black_box(ws.tree()), black_box(ws.snapshot())))
        });
    }

    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");

    for size in [10, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::new("build", size), size, |b, &size| {
            let mut ws = loaded_workspace(size);
            edit_workspace(&mut ws, size);
            b.iter(|| black_box(&ws).plan())
        });
    }

    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");

    for size in [100, 500].iter() {
        group.bench_with_input(BenchmarkId::new("workspace", size), size, |b, &size| {
            b.iter(|| loaded_workspace(black_box(size)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_diff, bench_plan, bench_load);
criterion_main!(benches);
