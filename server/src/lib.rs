//! Quizdraft Server - autosave backend for the quiz admin panel.
//!
//! Each quiz open in the editor is a session: an in-memory workspace from
//! `quizdraft-engine`, a debounced save scheduler that persists changes to a
//! remote record store in dependency order, and a status stream for the UI.

pub mod autosave;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod quiz_schema;
pub mod remote;
pub mod routes;
pub mod session;
pub mod websocket;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::Router;
use quizdraft_engine::Schema;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::remote::RemoteStore;
use crate::session::SessionRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RemoteStore>,
    pub schema: Arc<Schema>,
    pub sessions: Arc<SessionRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn RemoteStore>, schema: Schema, config: Config) -> Self {
        Self {
            store,
            schema: Arc::new(schema),
            sessions: SessionRegistry::new_shared(),
            config: Arc::new(config),
        }
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Lock a std mutex, recovering the data if a holder panicked.
///
/// Guards are only held for short synchronous sections, never across an
/// `.await`.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
