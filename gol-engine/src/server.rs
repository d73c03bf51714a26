use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::future::try_join_all;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use gol_common::client::WorkerClient;
use gol_common::health::HealthRegistry;
use gol_common::metrics::{setup_metrics_routes, track_metrics};
use gol_common::partition;
use gol_common::protocol::{
    AliveCountResponse, GridResponse, MessageResponse, StartRunRequest, StatusResponse,
};

use crate::config::Config;
use crate::error::EngineError;
use crate::run::{Command, EdgePair, RunError, RunOutcome, TurnLoop};

pub struct Engine {
    endpoints: Vec<String>,
    http: reqwest::Client,
    liveness: HealthRegistry,
    inner: Mutex<Inner>,
    /// Wakes result waiters whenever an outcome is published.
    done: Notify,
}

/// One run at a time. `commands` is Some exactly while a turn loop is
/// alive; `outcome` holds an unserved result until GetResult takes it.
#[derive(Default)]
struct Inner {
    commands: Option<mpsc::Sender<Command>>,
    outcome: Option<RunOutcome>,
}

impl Engine {
    pub fn new(config: &Config) -> Engine {
        let liveness = HealthRegistry::new("engine-liveness");
        // The control plane is up from the start; the turn_loop
        // component joins when a run begins.
        liveness.register("api").report_healthy();
        Engine {
            endpoints: config.worker_endpoints(),
            http: reqwest::Client::new(),
            liveness,
            inner: Mutex::default(),
            done: Notify::new(),
        }
    }
}

async fn index() -> &'static str {
    "gol-engine"
}

async fn start_run(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<StartRunRequest>,
) -> Result<Json<MessageResponse>, EngineError> {
    // The lock is held across worker startup so a second StartRun sees
    // Busy rather than a half-dialed pool.
    let mut inner = engine.inner.lock().await;
    if inner.commands.is_some() {
        return Err(EngineError::Busy);
    }

    request
        .grid
        .validate()
        .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
    let height = request.grid.height();
    let width = request.grid.width();
    if request.workers > engine.endpoints.len() {
        return Err(EngineError::InvalidInput(format!(
            "requested {} workers but only {} endpoints are configured",
            request.workers,
            engine.endpoints.len()
        )));
    }
    let specs = partition::split(height, request.workers)
        .map_err(|e| EngineError::InvalidInput(e.to_string()))?;

    if request.turns == 0 {
        // No evolution requested: the submitted grid is the result, and
        // no worker is dialed.
        inner.outcome = Some(Ok(GridResponse {
            grid: request.grid,
            completed_turns: 0,
        }));
        drop(inner);
        engine.done.notify_waiters();
        return Ok(Json(MessageResponse {
            message: "0 turns requested, grid returned unchanged".to_string(),
        }));
    }

    info!(
        height,
        width,
        turns = request.turns,
        workers = request.workers,
        "starting run"
    );

    let workers: Vec<WorkerClient> = engine.endpoints[..request.workers]
        .iter()
        .map(|address| WorkerClient::new(engine.http.clone(), address))
        .collect();

    // Start is the run's first evolution. A dial or start failure here
    // is InvalidInput to the caller: the run never became Running, so
    // the turn loop's fatal-transport rule does not apply yet.
    let starts = workers.iter().zip(&specs).enumerate().map(|(i, (worker, spec))| {
        worker.start(partition::strip_with_halos(&request.grid, *spec), i)
    });
    let replies = try_join_all(starts)
        .await
        .map_err(|e| EngineError::InvalidInput(format!("failed to start workers: {e}")))?;
    let edges = replies
        .into_iter()
        .map(|reply| EdgePair {
            top: reply.top_edge,
            bottom: reply.bottom_edge,
        })
        .collect();

    let (commands, receiver) = mpsc::channel(16);
    inner.commands = Some(commands);
    inner.outcome = None;

    let turn_loop = TurnLoop {
        workers,
        edges,
        turns: request.turns,
        completed: 1,
        commands: receiver,
        liveness: engine.liveness.register("turn_loop"),
    };
    let engine_for_loop = engine.clone();
    tokio::spawn(async move {
        let outcome = turn_loop.run().await;
        let mut inner = engine_for_loop.inner.lock().await;
        inner.commands = None;
        inner.outcome = Some(outcome);
        drop(inner);
        engine_for_loop.done.notify_waiters();
    });

    Ok(Json(MessageResponse {
        message: format!(
            "evolving a {height}x{width} grid for {} turns across {} workers",
            request.turns, request.workers
        ),
    }))
}

async fn get_result(
    State(engine): State<Arc<Engine>>,
) -> Result<Json<GridResponse>, EngineError> {
    loop {
        let notified = engine.done.notified();
        tokio::pin!(notified);
        // Register before checking, so a publish between the check and
        // the await still wakes us.
        notified.as_mut().enable();
        {
            let mut inner = engine.inner.lock().await;
            if let Some(outcome) = inner.outcome.take() {
                return match outcome {
                    Ok(result) => Ok(Json(result)),
                    Err(RunError::Canceled) => Err(EngineError::Canceled),
                    Err(e) => Err(EngineError::RunFailed(e.to_string())),
                };
            }
            if inner.commands.is_none() {
                return Err(EngineError::NotRunning);
            }
        }
        notified.await;
    }
}

/// Clones the live run's command sender, or reports NotRunning.
async fn command_sender(engine: &Engine) -> Result<mpsc::Sender<Command>, EngineError> {
    engine
        .inner
        .lock()
        .await
        .commands
        .clone()
        .ok_or(EngineError::NotRunning)
}

async fn send_command<T>(
    engine: &Engine,
    build: impl FnOnce(oneshot::Sender<T>) -> Command,
) -> Result<T, EngineError> {
    let sender = command_sender(engine).await?;
    let (reply, receiver) = oneshot::channel();
    sender
        .send(build(reply))
        .await
        .map_err(|_| EngineError::NotRunning)?;
    receiver.await.map_err(|_| EngineError::NotRunning)
}

async fn alive_count(
    State(engine): State<Arc<Engine>>,
) -> Result<Json<AliveCountResponse>, EngineError> {
    let counts = send_command(&engine, Command::AliveCount).await??;
    Ok(Json(counts))
}

async fn snapshot(State(engine): State<Arc<Engine>>) -> Result<Json<GridResponse>, EngineError> {
    let assembled = send_command(&engine, Command::Snapshot).await??;
    Ok(Json(assembled))
}

async fn pause(State(engine): State<Arc<Engine>>) -> Result<Json<MessageResponse>, EngineError> {
    let message = send_command(&engine, Command::Pause).await?;
    Ok(Json(MessageResponse { message }))
}

async fn resume(State(engine): State<Arc<Engine>>) -> Result<Json<MessageResponse>, EngineError> {
    let message = send_command(&engine, Command::Resume).await?;
    Ok(Json(MessageResponse { message }))
}

async fn stop(State(engine): State<Arc<Engine>>) -> Result<Json<MessageResponse>, EngineError> {
    let message = send_command(&engine, Command::Stop).await?;
    Ok(Json(MessageResponse { message }))
}

async fn status(State(engine): State<Arc<Engine>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: engine.inner.lock().await.commands.is_some(),
    })
}

async fn reconnect(
    State(engine): State<Arc<Engine>>,
) -> Result<Json<MessageResponse>, EngineError> {
    if engine.inner.lock().await.commands.is_some() {
        // Advisory only: the run is not transferred, the caller simply
        // keeps driving it over the same control plane.
        Ok(Json(MessageResponse {
            message: "reconnected to run in progress".to_string(),
        }))
    } else {
        Err(EngineError::NotRunning)
    }
}

async fn stop_workers(State(engine): State<Arc<Engine>>) -> Json<MessageResponse> {
    for (i, endpoint) in engine.endpoints.iter().enumerate() {
        let worker = WorkerClient::new(engine.http.clone(), endpoint);
        if let Err(e) = worker.stop().await {
            warn!(worker = i, "failed to stop worker: {e}");
        }
    }
    Json(MessageResponse {
        message: "ok".to_string(),
    })
}

pub fn router(engine: Arc<Engine>, export_prometheus: bool) -> Router {
    let liveness = engine.liveness.clone();
    let router = Router::new()
        .route("/", get(index))
        .route("/run", post(start_run))
        .route("/result", get(get_result))
        .route("/alive", get(alive_count))
        .route("/snapshot", get(snapshot))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/stop", post(stop))
        .route("/status", get(status))
        .route("/reconnect", post(reconnect))
        .route("/workers/stop", post(stop_workers))
        .route(
            "/_liveness",
            get(move || std::future::ready(liveness.get_status())),
        )
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(engine);

    if export_prometheus {
        setup_metrics_routes(router)
    } else {
        router
    }
}

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let engine = Arc::new(Engine::new(&config));
    let app = router(engine, config.export_prometheus);

    info!("engine listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
