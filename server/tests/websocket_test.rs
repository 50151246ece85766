//! Tests for the WebSocket status stream and its protocol.

use std::sync::Arc;
use std::time::Duration;

use quizdraft_engine::{ExecutionResult, Identity, OpKind, Record, SaveState, StatusReport};
use quizdraft_server::autosave::CycleSummary;
use quizdraft_server::config::AutosaveConfig;
use quizdraft_server::quiz_schema::quiz_schema;
use quizdraft_server::remote::MemoryStore;
use quizdraft_server::session::Session;
use quizdraft_server::websocket::{ClientMessage, ServerMessage};
use serde_json::json;

#[cfg(test)]
mod websocket_protocol_tests {
    use super::*;

    #[test]
    fn test_saved_message_serialization() {
        let mut result = ExecutionResult::new();
        result.succeeded(
            "questions",
            Identity::provisional("1"),
            OpKind::Insert,
            Some("Q7".to_string()),
        );
        let msg = ServerMessage::Saved {
            summary: CycleSummary::completed(4, result),
            request_id: Some("req-9".to_string()),
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "saved");
        assert_eq!(json["request_id"], "req-9");
        assert_eq!(json["summary"]["cycle"], 4);
        assert_eq!(json["summary"]["verdict"], "success");
        assert_eq!(json["summary"]["outcomes"][0]["target"], "new-1");
        assert_eq!(json["summary"]["outcomes"][0]["status"]["assigned"], "Q7");
    }

    #[test]
    fn test_error_status_carries_failures() {
        let msg = ServerMessage::status(StatusReport {
            state: SaveState::Error {
                failed: Vec::new(),
                message: Some("remote store unavailable".to_string()),
            },
            pending_changes: 2,
            cycle: 1,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["state"], "error");
        assert_eq!(json["message"], "remote store unavailable");
        assert_eq!(json["pendingChanges"], 2);
    }

    #[test]
    fn test_unknown_message_is_rejected() {
        let result: Result<ClientMessage, _> = serde_json::from_str(r#"{"type": "pull"}"#);
        assert!(result.is_err());
    }
}

#[cfg(test)]
mod status_stream_tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_stream_follows_cycle() {
        let store = Arc::new(MemoryStore::new());
        store.seed("quizzes", Record::new("quiz-1", json!({"title": "Capitals"})));
        let session = Session::open(store, quiz_schema(), "quiz-1", AutosaveConfig::default())
            .await
            .unwrap();

        let mut rx = session.subscribe();
        let seen = tokio::spawn(async move {
            let mut states = Vec::new();
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().state.clone();
                if states.last() != Some(&state) {
                    states.push(state);
                }
                if states.len() == 4 {
                    break;
                }
            }
            states
        });

        session
            .insert("levels", None, json!({"name": "Beginner"}))
            .unwrap();
        sleep(Duration::from_secs(10)).await;

        let states = seen.await.unwrap();
        assert_eq!(
            states,
            vec![
                SaveState::Pending,
                SaveState::Saving,
                SaveState::Saved,
                SaveState::Idle
            ]
        );
    }
}
