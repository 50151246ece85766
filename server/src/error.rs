//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quizdraft_engine::Error as EngineError;
use serde::Serialize;

use crate::remote::RemoteError;
use crate::session::SessionError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Remote(e) => AppError::Remote(e),
            SessionError::Engine(e) => AppError::Engine(e),
            SessionError::QuizNotFound(id) => AppError::NotFound(format!("quiz {id}")),
            SessionError::AlreadyPublished(id) => {
                AppError::Conflict(format!("quiz {id} is already published"))
            }
        }
    }
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            AppError::Remote(RemoteError::NotFound { collection, id }) => (
                StatusCode::NOT_FOUND,
                format!("{collection}/{id} not found"),
                None,
            ),
            AppError::Remote(e) => {
                tracing::error!("Remote store error: {:?}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "Remote store error".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::Engine(e) => {
                tracing::warn!("Engine error: {:?}", e);
                let status = match e {
                    EngineError::CollectionNotFound(_) | EngineError::EntityNotFound { .. } => {
                        StatusCode::NOT_FOUND
                    }
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, e.to_string(), None)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), None),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
