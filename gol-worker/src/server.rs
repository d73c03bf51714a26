use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

use gol_common::health::{HealthHandle, HealthRegistry};
use gol_common::metrics::{setup_metrics_routes, track_metrics};
use gol_common::protocol::{
    EdgesResponse, Empty, StartStripRequest, StepRequest, StripSnapshotResponse,
    WorkerAliveResponse,
};

use crate::config::Config;
use crate::error::WorkerError;
use crate::strip::Strip;

/// The mutex is the worker's whole concurrency story: one request at a
/// time touches the strip, so snapshots can never observe a half-stepped
/// state.
#[derive(Clone)]
pub struct AppState {
    strip: Arc<Mutex<Option<Strip>>>,
    liveness: HealthHandle,
}

async fn index() -> &'static str {
    "gol-worker"
}

async fn start(
    State(state): State<AppState>,
    Json(request): Json<StartStripRequest>,
) -> Result<Json<EdgesResponse>, WorkerError> {
    let mut slot = state.strip.lock().await;
    let owned_rows = request.rows.len().saturating_sub(2);
    let mut strip = Strip::new(request.rows, request.worker_id)?;
    // Start doubles as the run's first evolution.
    let (top_edge, bottom_edge) = strip.advance();
    info!(
        worker_id = request.worker_id,
        rows = owned_rows,
        "strip initialized"
    );
    *slot = Some(strip);
    state.liveness.report_healthy();
    metrics::counter!("worker_turns_total").increment(1);
    Ok(Json(EdgesResponse {
        top_edge,
        bottom_edge,
    }))
}

async fn step(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<Json<EdgesResponse>, WorkerError> {
    let mut slot = state.strip.lock().await;
    let strip = slot.as_mut().ok_or(WorkerError::NotInitialized)?;

    let start = Instant::now();
    let (top_edge, bottom_edge) = strip.step(request.top_halo, request.bottom_halo)?;
    metrics::histogram!("worker_step_duration_seconds").record(start.elapsed().as_secs_f64());
    metrics::counter!("worker_turns_total").increment(1);
    state.liveness.report_healthy();

    Ok(Json(EdgesResponse {
        top_edge,
        bottom_edge,
    }))
}

async fn snapshot(
    State(state): State<AppState>,
) -> Result<Json<StripSnapshotResponse>, WorkerError> {
    let slot = state.strip.lock().await;
    let strip = slot.as_ref().ok_or(WorkerError::NotInitialized)?;
    Ok(Json(StripSnapshotResponse {
        rows: strip.snapshot(),
        worker_id: strip.worker_id(),
    }))
}

async fn alive_count(
    State(state): State<AppState>,
) -> Result<Json<WorkerAliveResponse>, WorkerError> {
    let slot = state.strip.lock().await;
    let strip = slot.as_ref().ok_or(WorkerError::NotInitialized)?;
    Ok(Json(WorkerAliveResponse {
        count: strip.alive_count(),
    }))
}

async fn stop(State(state): State<AppState>) -> Json<Empty> {
    let mut slot = state.strip.lock().await;
    if slot.take().is_some() {
        info!("strip released");
    }
    Json(Empty {})
}

pub fn router(liveness: HealthRegistry) -> Router {
    let strip_liveness = liveness.register("strip");
    // An idle worker is a healthy worker; start/step keep reporting.
    strip_liveness.report_healthy();
    let state = AppState {
        strip: Arc::new(Mutex::new(None)),
        liveness: strip_liveness,
    };

    Router::new()
        .route("/", get(index))
        .route("/start", post(start))
        .route("/step", post(step))
        .route("/snapshot", get(snapshot))
        .route("/alive", get(alive_count))
        .route("/stop", post(stop))
        .route(
            "/_liveness",
            get(move || std::future::ready(liveness.get_status())),
        )
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state)
}

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let liveness = HealthRegistry::new("worker-liveness");
    let mut app = router(liveness);
    if config.export_prometheus {
        app = setup_metrics_routes(app);
    }

    info!("worker listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
