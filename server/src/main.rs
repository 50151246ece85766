//! Quizdraft Server entry point.

use std::sync::Arc;

use quizdraft_server::config::Config;
use quizdraft_server::db::{self, PgStore};
use quizdraft_server::quiz_schema::quiz_schema;
use quizdraft_server::remote::{MemoryStore, RemoteStore};
use quizdraft_server::{app, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizdraft_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Quizdraft Server on {}:{}", config.host, config.port);

    let store: Arc<dyn RemoteStore> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url, config.database_max_connections).await?;

            tracing::info!("Running database migrations...");
            db::run_migrations(&pool).await?;

            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping records in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(store, quiz_schema(), config);
    let sessions = state.sessions.clone();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    sessions.close_all();
    Ok(())
}
