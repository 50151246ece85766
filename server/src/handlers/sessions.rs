//! Session handlers - open, edit, save and close quizzes.

use std::sync::Arc;

use quizdraft_engine::{EntityTree, Identity, RecordId, StatusReport};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::autosave::CycleSummary;
use crate::error::{AppError, Result};
use crate::session::Session;
use crate::AppState;

/// Title given to a draft opened without fields.
pub const DEFAULT_DRAFT_TITLE: &str = "Untitled quiz";

/// Request body for opening a session.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    /// Existing quiz to open; a draft is started without one
    #[serde(default)]
    pub quiz_id: Option<String>,
    /// Root fields for a draft
    #[serde(default)]
    pub fields: Option<Value>,
}

/// A session with its tree and status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub quiz_id: Option<RecordId>,
    pub tree: EntityTree,
    pub status: StatusReport,
}

impl SessionResponse {
    fn of(session: &Session) -> Self {
        Self {
            session_id: session.id().to_string(),
            quiz_id: session.quiz_id(),
            tree: session.tree(),
            status: session.status(),
        }
    }
}

/// Request body for creating an entity.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRequest {
    /// Parent entity, for nested collections
    #[serde(default)]
    pub parent: Option<Identity>,
    pub content: Value,
}

/// Request body for changing an entity.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    /// Replacement content
    #[serde(default)]
    pub content: Option<Value>,
    /// New parent, for nested collections
    #[serde(default)]
    pub parent: Option<Identity>,
}

/// Response for a created entity.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResponse {
    pub id: Identity,
    pub status: StatusReport,
}

/// Response for a removal.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResponse {
    /// The entity plus its removed children
    pub removed: usize,
    pub status: StatusReport,
}

/// Response for a published draft.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub quiz_id: RecordId,
    pub status: StatusReport,
}

fn find(state: &AppState, session_id: &str) -> Result<Arc<Session>> {
    state
        .sessions
        .get(session_id)
        .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))
}

/// Open an existing quiz, or start a draft.
pub async fn handle_open(state: &AppState, request: OpenSessionRequest) -> Result<SessionResponse> {
    let schema = state.schema.as_ref().clone();
    let autosave = state.config.autosave;

    let session = match request.quiz_id {
        Some(quiz_id) => Session::open(state.store.clone(), schema, &quiz_id, autosave).await?,
        None => {
            let fields = request
                .fields
                .unwrap_or_else(|| json!({ "title": DEFAULT_DRAFT_TITLE }));
            Session::draft(state.store.clone(), schema, fields, autosave)?
        }
    };

    let session = state.sessions.register(session);
    Ok(SessionResponse::of(&session))
}

pub fn handle_get(state: &AppState, session_id: &str) -> Result<SessionResponse> {
    let session = find(state, session_id)?;
    Ok(SessionResponse::of(&session))
}

pub fn handle_status(state: &AppState, session_id: &str) -> Result<StatusReport> {
    Ok(find(state, session_id)?.status())
}

pub fn handle_set_root(state: &AppState, session_id: &str, fields: Value) -> Result<StatusReport> {
    let session = find(state, session_id)?;
    session.set_root_fields(fields)?;
    Ok(session.status())
}

pub fn handle_insert(
    state: &AppState,
    session_id: &str,
    collection: &str,
    request: InsertRequest,
) -> Result<InsertResponse> {
    let session = find(state, session_id)?;
    let id = session.insert(collection, request.parent, request.content)?;
    tracing::debug!(session = %session_id, collection = %collection, entity = %id, "Entity created");
    Ok(InsertResponse {
        id,
        status: session.status(),
    })
}

pub fn handle_update(
    state: &AppState,
    session_id: &str,
    collection: &str,
    entity: &str,
    request: UpdateRequest,
) -> Result<StatusReport> {
    if request.content.is_none() && request.parent.is_none() {
        return Err(AppError::BadRequest(
            "expected content, parent, or both".to_string(),
        ));
    }
    let session = find(state, session_id)?;
    let id = Identity::parse(entity)?;
    session.update(collection, &id, request.content, request.parent)?;
    Ok(session.status())
}

pub fn handle_remove(
    state: &AppState,
    session_id: &str,
    collection: &str,
    entity: &str,
) -> Result<RemoveResponse> {
    let session = find(state, session_id)?;
    let id = Identity::parse(entity)?;
    let removed = session.remove(collection, &id)?;
    tracing::debug!(session = %session_id, collection = %collection, entity = %id, removed, "Entity removed");
    Ok(RemoveResponse {
        removed,
        status: session.status(),
    })
}

/// Save now and wait for the cycle.
pub async fn handle_save(state: &AppState, session_id: &str) -> Result<CycleSummary> {
    let session = find(state, session_id)?;
    session.save_now().await.ok_or_else(|| {
        AppError::Conflict("autosave is not active for this session".to_string())
    })
}

pub async fn handle_publish(state: &AppState, session_id: &str) -> Result<PublishResponse> {
    let session = find(state, session_id)?;
    let quiz_id = session.publish().await?;
    Ok(PublishResponse {
        quiz_id,
        status: session.status(),
    })
}

pub fn handle_close(state: &AppState, session_id: &str) -> Result<()> {
    state
        .sessions
        .remove(session_id)
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))
}

/// Look up a session for a WebSocket upgrade.
pub fn handle_subscribe(state: &AppState, session_id: &str) -> Result<Arc<Session>> {
    find(state, session_id)
}
