//! HTTP route tests.
//!
//! Requests go straight into the router with `oneshot`; one test runs the
//! server on an ephemeral port and drives it with `reqwest`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use quizdraft_engine::Record;
use quizdraft_server::config::Config;
use quizdraft_server::quiz_schema::quiz_schema;
use quizdraft_server::remote::{CallKind, MemoryStore};
use quizdraft_server::{app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_config() -> Config {
    Config::from_vars(|_| None).unwrap()
}

fn setup() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.seed("quizzes", Record::new("quiz-1", json!({"title": "Capitals"})));
    store.seed(
        "questions",
        Record::new("Q1", json!({"text": "France?", "quiz_id": "quiz-1"})),
    );
    store.seed(
        "answers",
        Record::new("A9", json!({"text": "Lyon", "question_id": "Q1"})),
    );
    let state = AppState::new(store.clone(), quiz_schema(), test_config());
    (app(state), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn open_quiz(app: &Router) -> String {
    let (status, body) = send(app, "POST", "/sessions", Some(json!({"quizId": "quiz-1"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["sessionId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_sessions() {
    let (app, _store) = setup();
    open_quiz(&app).await;

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 1);
}

#[tokio::test]
async fn open_edit_and_save() {
    let (app, store) = setup();
    let sid = open_quiz(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/sessions/{sid}/collections/questions"),
        Some(json!({"content": {"text": "Spain?"}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "new-1");
    assert_eq!(body["status"]["state"], "pending");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/sessions/{sid}/collections/answers"),
        Some(json!({"parent": "new-1", "content": {"text": "Madrid", "correct": true}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/sessions/{sid}/collections/answers/A9"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);
    assert_eq!(body["status"]["pendingChanges"], 3);

    let (status, summary) = send(&app, "POST", &format!("/sessions/{sid}/save"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["verdict"], "success");
    assert_eq!(summary["operations"], 3);

    let (_, status_body) = send(&app, "GET", &format!("/sessions/{sid}/status"), None).await;
    assert_eq!(status_body["state"], "saved");
    assert_eq!(status_body["pendingChanges"], 0);

    let answers = store.records("answers");
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].payload["question_id"], "r1");
}

#[tokio::test]
async fn invalid_edits_are_rejected() {
    let (app, _store) = setup();
    let sid = open_quiz(&app).await;

    // Missing required field.
    let (status, body) = send(
        &app,
        "POST",
        &format!("/sessions/{sid}/collections/questions"),
        Some(json!({"content": {"position": 1}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("text"));

    // Answer without a parent question.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/sessions/{sid}/collections/answers"),
        Some(json!({"content": {"text": "Madrid"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/sessions/{sid}/collections/questions/Q404"),
        Some(json!({"content": {"text": "?"}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/sessions/{sid}/collections/questions/Q1"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/sessions/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn draft_publish_flow() {
    let (app, store) = setup();
    let (status, body) = send(
        &app,
        "POST",
        "/sessions",
        Some(json!({"fields": {"title": "Oceans"}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["quizId"].is_null());
    let sid = body["sessionId"].as_str().unwrap().to_string();

    send(
        &app,
        "POST",
        &format!("/sessions/{sid}/collections/levels"),
        Some(json!({"content": {"name": "Sailor", "min_score": 0}})),
    )
    .await;

    // Nothing to save into until the quiz exists.
    let (status, _) = send(&app, "POST", &format!("/sessions/{sid}/save"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, "POST", &format!("/sessions/{sid}/publish"), None).await;
    assert_eq!(status, StatusCode::OK);
    let quiz_id = body["quizId"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "POST", &format!("/sessions/{sid}/publish"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, summary) = send(&app, "POST", &format!("/sessions/{sid}/save"), None).await;
    assert_eq!(summary["verdict"], "success");
    assert_eq!(store.records("levels")[0].payload["quiz_id"], quiz_id.as_str());
}

#[tokio::test]
async fn closed_session_is_gone() {
    let (app, store) = setup();
    let sid = open_quiz(&app).await;

    send(
        &app,
        "PUT",
        &format!("/sessions/{sid}/root"),
        Some(json!({"title": "Capitals of Europe"})),
    )
    .await;
    let (status, _) = send(&app, "DELETE", &format!("/sessions/{sid}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/sessions/{sid}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    // The pending timer died with the session.
    assert!(store.writes().iter().all(|c| c.kind != CallKind::Update));
}

#[tokio::test]
async fn serve_over_tcp() {
    let (app, _store) = setup();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let body: Value = client
        .post(format!("http://{addr}/sessions"))
        .json(&json!({"quizId": "quiz-1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let sid = body["sessionId"].as_str().unwrap();
    assert_eq!(body["tree"]["collections"]["questions"][0]["id"], "Q1");

    let response = client
        .put(format!("http://{addr}/sessions/{sid}/collections/questions/Q1"))
        .json(&json!({"content": {"text": "Germany?"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let summary: Value = client
        .post(format!("http://{addr}/sessions/{sid}/save"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["verdict"], "success");
}
