//! Stepwise Server: HTTP surface for a workflow.
//!
//! Provides:
//! - `GET  /api/health`
//! - `POST /api/executions`: start a run in the background
//! - `GET  /api/executions`: archived executions, newest first
//! - `GET  /api/executions/{id}`: one archived execution
//!
//! The server can be embedded (see [`start_server`] and
//! [`start_server_with_state`]) or started from the `stepwise server`
//! command.

pub mod api;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use stepwise_core::{Database, ExecutionStore, Workflow};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, AppStateInner};

/// Configuration for the Stepwise HTTP server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3220,
            db_path: "stepwise.db".to_string(),
        }
    }
}

/// Create a shared `AppState` for a workflow and an archive database path.
pub fn create_app_state(workflow: Arc<Workflow>, db_path: &str) -> Result<AppState, String> {
    let db = Database::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(AppStateInner::new(workflow, ExecutionStore::new(db))))
}

/// Build the full router: API routes, health check, CORS and request tracing.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server for a workflow, archiving into `config.db_path`.
pub async fn start_server(
    config: ServerConfig,
    workflow: Arc<Workflow>,
) -> Result<SocketAddr, String> {
    let state = create_app_state(workflow, &config.db_path)?;
    start_server_with_state(config, state).await
}

/// Start the HTTP server with a pre-built `AppState`.
///
/// Returns the actual address the server is listening on; the server
/// itself runs on a background task.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Stepwise server listening on {}", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "stepwise-server",
        "version": env!("CARGO_PKG_VERSION"),
        "workflow": state.workflow.name(),
    }))
}
