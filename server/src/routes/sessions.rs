//! Session endpoint routes.

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use quizdraft_engine::StatusReport;
use serde_json::Value;

use crate::autosave::CycleSummary;
use crate::error::Result;
use crate::handlers::{
    handle_close, handle_get, handle_insert, handle_open, handle_publish, handle_remove,
    handle_save, handle_set_root, handle_status, handle_subscribe, handle_update,
    handle_websocket_connection, InsertRequest, InsertResponse, OpenSessionRequest,
    PublishResponse, RemoveResponse, SessionResponse, UpdateRequest,
};
use crate::AppState;

/// Create session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(open_handler))
        .route("/sessions/{sid}", get(get_handler).delete(close_handler))
        .route("/sessions/{sid}/publish", post(publish_handler))
        .route("/sessions/{sid}/root", put(set_root_handler))
        .route("/sessions/{sid}/collections/{collection}", post(insert_handler))
        .route(
            "/sessions/{sid}/collections/{collection}/{entity}",
            put(update_handler).delete(remove_handler),
        )
        .route("/sessions/{sid}/save", post(save_handler))
        .route("/sessions/{sid}/status", get(status_handler))
        .route("/sessions/{sid}/ws", get(ws_handler))
}

/// POST /sessions - Open a quiz or start a draft.
async fn open_handler(
    State(state): State<AppState>,
    Json(request): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let response = handle_open(&state, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /sessions/{sid} - Current tree and status.
async fn get_handler(
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Result<Json<SessionResponse>> {
    Ok(Json(handle_get(&state, &sid)?))
}

/// DELETE /sessions/{sid} - Tear the session down.
async fn close_handler(
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Result<StatusCode> {
    handle_close(&state, &sid)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /sessions/{sid}/publish - Create a draft's quiz remotely.
async fn publish_handler(
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Result<Json<PublishResponse>> {
    Ok(Json(handle_publish(&state, &sid).await?))
}

/// PUT /sessions/{sid}/root - Replace the quiz fields.
async fn set_root_handler(
    State(state): State<AppState>,
    Path(sid): Path<String>,
    Json(fields): Json<Value>,
) -> Result<Json<StatusReport>> {
    Ok(Json(handle_set_root(&state, &sid, fields)?))
}

/// POST /sessions/{sid}/collections/{collection} - Create an entity.
async fn insert_handler(
    State(state): State<AppState>,
    Path((sid, collection)): Path<(String, String)>,
    Json(request): Json<InsertRequest>,
) -> Result<(StatusCode, Json<InsertResponse>)> {
    let response = handle_insert(&state, &sid, &collection, request)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// PUT /sessions/{sid}/collections/{collection}/{entity} - Change an entity.
async fn update_handler(
    State(state): State<AppState>,
    Path((sid, collection, entity)): Path<(String, String, String)>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<StatusReport>> {
    Ok(Json(handle_update(
        &state,
        &sid,
        &collection,
        &entity,
        request,
    )?))
}

/// DELETE /sessions/{sid}/collections/{collection}/{entity} - Remove an
/// entity and its children.
async fn remove_handler(
    State(state): State<AppState>,
    Path((sid, collection, entity)): Path<(String, String, String)>,
) -> Result<Json<RemoveResponse>> {
    Ok(Json(handle_remove(&state, &sid, &collection, &entity)?))
}

/// POST /sessions/{sid}/save - Save now.
async fn save_handler(
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Result<Json<CycleSummary>> {
    Ok(Json(handle_save(&state, &sid).await?))
}

/// GET /sessions/{sid}/status - Current save status.
async fn status_handler(
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Result<Json<StatusReport>> {
    Ok(Json(handle_status(&state, &sid)?))
}

/// GET /sessions/{sid}/ws - Stream save status over a WebSocket.
async fn ws_handler(
    State(state): State<AppState>,
    Path(sid): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let session = handle_subscribe(&state, &sid)?;
    Ok(ws.on_upgrade(move |socket| handle_websocket_connection(socket, session)))
}
