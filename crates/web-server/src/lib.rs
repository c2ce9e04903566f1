// In crates/web-server/src/lib.rs

use std::sync::Arc;

use app_config::ServerSettings;
use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
};
use core_types::{BotStatus, ControlAck, RunDetail, RunId, RunList, TimeSeries};
use tokio::net::TcpListener;
use types::TimeseriesParams;

pub mod control;
pub mod error;
pub mod runs;
pub mod types;

// Re-export our custom error type for convenience.
pub use control::BotController;
pub use error::{Error, Result};
pub use runs::RunStore;

/// The shared application state that is available to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub runs: RunStore,
    pub bot: Arc<BotController>,
    /// Row cap for time-series responses when the request sets none.
    pub timeseries_limit: usize,
}

impl AppState {
    pub fn new(settings: &ServerSettings) -> Self {
        Self {
            runs: RunStore::new(&settings.runs_dir),
            bot: Arc::new(BotController::new(settings)),
            timeseries_limit: settings.timeseries_limit,
        }
    }
}

/// Creates the main application router with all routes and middleware.
pub fn create_router(app_state: AppState) -> Router {
    // The dashboard may be served from any origin.
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let api_router = Router::new()
        .route("/runs", get(list_runs_handler))
        .route("/runs/{run_id}", get(run_detail_handler))
        .route("/runs/{run_id}/timeseries", get(timeseries_handler))
        .route("/control/status", get(bot_status_handler))
        .route("/control/start", post(start_bot_handler))
        .route("/control/stop", post(stop_bot_handler));

    Router::new()
        .route("/health", get(health_check_handler))
        .nest("/api", api_router)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn health_check_handler() -> &'static str {
    "OK"
}

/// Runs blocking artifact reads off the async workers.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
}

/// Handler for `GET /api/runs`
async fn list_runs_handler(State(state): State<AppState>) -> Result<Json<RunList>> {
    let store = state.runs.clone();
    let runs = blocking(move || store.list()).await?;
    Ok(Json(RunList { runs }))
}

/// Handler for `GET /api/runs/{run_id}`
async fn run_detail_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<RunDetail>> {
    let run_id = RunId::parse(&raw)?;
    let store = state.runs.clone();
    let detail = blocking(move || store.detail(&run_id)).await?;
    Ok(Json(detail))
}

/// Handler for `GET /api/runs/{run_id}/timeseries`
async fn timeseries_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(params): Query<TimeseriesParams>,
) -> Result<Json<TimeSeries>> {
    let run_id = RunId::parse(&raw)?;
    let limit = match params.limit {
        Some(0) => return Err(Error::BadRequest("limit must be at least 1".into())),
        Some(limit) => limit,
        None => state.timeseries_limit,
    };
    tracing::debug!(%run_id, limit, "Loading time-series.");

    let store = state.runs.clone();
    let series = blocking(move || store.timeseries(&run_id, limit)).await?;
    Ok(Json(series))
}

/// Handler for `GET /api/control/status`
async fn bot_status_handler(State(state): State<AppState>) -> Result<Json<BotStatus>> {
    Ok(Json(state.bot.status().await?))
}

/// Handler for `POST /api/control/start`
async fn start_bot_handler(State(state): State<AppState>) -> Result<Json<ControlAck>> {
    Ok(Json(state.bot.start().await?))
}

/// Handler for `POST /api/control/stop`
async fn stop_bot_handler(State(state): State<AppState>) -> Result<Json<ControlAck>> {
    Ok(Json(state.bot.stop().await?))
}

/// The main entry point for running the web server.
///
/// Serves until Ctrl-C is received.
pub async fn run(settings: ServerSettings) -> Result<()> {
    let app = create_router(AppState::new(&settings));

    let address = format!("{}:{}", settings.host, settings.port);
    let listener = TcpListener::bind(&address).await.map_err(Error::ServerBindError)?;
    tracing::info!(
        %address,
        runs_dir = %settings.runs_dir.display(),
        "Control Tower backend listening."
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received.");
        })
        .await?;

    Ok(())
}
