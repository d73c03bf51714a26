//! The turn loop: the one task that advances a run.
//!
//! The engine keeps no cell data between turns. What it keeps is the
//! edge-pair table: for every worker, copies of its first and last owned
//! rows as of the last completed turn. Each turn synthesizes every
//! worker's next halo pair from that table, fans the steps out, and only
//! commits the freshly collected edges once every worker has answered.

use std::time::Instant;

use futures::future::{join_all, try_join_all};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use gol_common::client::{ClientError, WorkerClient};
use gol_common::grid::GridError;
use gol_common::health::HealthHandle;
use gol_common::partition;
use gol_common::protocol::{AliveCountResponse, GridResponse};

/// Control requests the loop serves at turn boundaries.
pub enum Command {
    AliveCount(oneshot::Sender<Result<AliveCountResponse, ClientError>>),
    Snapshot(oneshot::Sender<Result<GridResponse, RunError>>),
    Pause(oneshot::Sender<String>),
    Resume(oneshot::Sender<String>),
    Stop(oneshot::Sender<String>),
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("run stopped before completion")]
    Canceled,
    #[error("worker call failed: {0}")]
    Worker(#[from] ClientError),
    #[error("worker {expected} answered with worker id {found}")]
    WorkerIdMismatch { expected: usize, found: usize },
    #[error("assembled grid is corrupt: {0}")]
    Assembly(#[from] GridError),
}

pub type RunOutcome = Result<GridResponse, RunError>;

/// A worker's first and last owned rows after its last completed turn.
pub struct EdgePair {
    pub top: Vec<u8>,
    pub bottom: Vec<u8>,
}

enum Flow {
    Continue,
    Stop,
}

pub struct TurnLoop {
    pub workers: Vec<WorkerClient>,
    pub edges: Vec<EdgePair>,
    pub turns: u32,
    /// Turns completed so far; Start already performed the first.
    pub completed: u32,
    pub commands: mpsc::Receiver<Command>,
    pub liveness: HealthHandle,
}

impl TurnLoop {
    pub async fn run(mut self) -> RunOutcome {
        self.liveness.report_healthy();
        while self.completed < self.turns {
            if let Flow::Stop = self.poll_commands().await {
                info!(turn = self.completed, "run stopped");
                self.stop_workers().await;
                return Err(RunError::Canceled);
            }
            if let Err(e) = self.advance_turn().await {
                warn!(turn = self.completed + 1, "fatal worker failure: {e}");
                self.liveness.report_unhealthy();
                self.stop_workers().await;
                return Err(e);
            }
        }
        let result = match self.assemble().await {
            Ok(result) => result,
            Err(e) => {
                self.liveness.report_unhealthy();
                self.stop_workers().await;
                return Err(e);
            }
        };
        info!(turns = self.completed, "run complete");
        Ok(result)
    }

    /// Drains every queued control request without blocking the turn.
    async fn poll_commands(&mut self) -> Flow {
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    if let Flow::Stop = self.dispatch(command).await {
                        return Flow::Stop;
                    }
                }
                Err(mpsc::error::TryRecvError::Empty)
                | Err(mpsc::error::TryRecvError::Disconnected) => return Flow::Continue,
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Flow {
        match command {
            Command::AliveCount(reply) => {
                let _unused = reply.send(self.alive_count().await);
                Flow::Continue
            }
            Command::Snapshot(reply) => {
                let _unused = reply.send(self.assemble().await);
                Flow::Continue
            }
            Command::Pause(reply) => {
                info!(turn = self.completed, "paused");
                let _unused = reply.send(format!("Pausing on turn {}", self.completed));
                self.paused().await
            }
            Command::Resume(reply) => {
                // Resume without a pause in effect is a no-op.
                let _unused = reply.send("Continuing".to_string());
                Flow::Continue
            }
            Command::Stop(reply) => {
                let _unused = reply.send("Stopping engine".to_string());
                Flow::Stop
            }
        }
    }

    /// Blocks between turns until Resume or Stop. Counts and snapshots
    /// stay available; the halos are whole at every pause point.
    async fn paused(&mut self) -> Flow {
        loop {
            match self.commands.recv().await {
                Some(Command::Resume(reply)) => {
                    info!(turn = self.completed, "resumed");
                    let _unused = reply.send("Continuing".to_string());
                    return Flow::Continue;
                }
                Some(Command::Stop(reply)) => {
                    let _unused = reply.send("Stopping engine".to_string());
                    return Flow::Stop;
                }
                Some(Command::Pause(reply)) => {
                    let _unused = reply.send(format!("Already paused on turn {}", self.completed));
                }
                Some(Command::AliveCount(reply)) => {
                    let _unused = reply.send(self.alive_count().await);
                }
                Some(Command::Snapshot(reply)) => {
                    let _unused = reply.send(self.assemble().await);
                }
                None => return Flow::Stop,
            }
        }
    }

    async fn advance_turn(&mut self) -> Result<(), RunError> {
        let n = self.workers.len();
        let start = Instant::now();

        let steps = self.workers.iter().enumerate().map(|(i, worker)| {
            let top_halo = self.edges[(i + n - 1) % n].bottom.clone();
            let bottom_halo = self.edges[(i + 1) % n].top.clone();
            worker.step(top_halo, bottom_halo)
        });
        let replies = try_join_all(steps).await?;

        // Every worker stepped against the same frozen table; only now
        // may it change. With N = 2 both halos of a worker come from the
        // same slot, which is why an in-place update would corrupt it.
        self.edges = replies
            .into_iter()
            .map(|reply| EdgePair {
                top: reply.top_edge,
                bottom: reply.bottom_edge,
            })
            .collect();
        self.completed += 1;

        self.liveness.report_healthy();
        metrics::counter!("engine_turns_total").increment(1);
        metrics::histogram!("engine_turn_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        if self.completed % 100 == 0 {
            info!(turn = self.completed, "turn computed");
        } else {
            debug!(turn = self.completed, "turn computed");
        }
        Ok(())
    }

    async fn alive_count(&self) -> Result<AliveCountResponse, ClientError> {
        let counts = try_join_all(self.workers.iter().map(WorkerClient::alive_count)).await?;
        Ok(AliveCountResponse {
            count: counts.iter().map(|reply| reply.count).sum(),
            completed_turns: self.completed,
        })
    }

    /// Snapshots every worker and reassembles the strips in id order.
    async fn assemble(&self) -> Result<GridResponse, RunError> {
        let snapshots = try_join_all(self.workers.iter().map(WorkerClient::snapshot)).await?;
        let mut strips = Vec::with_capacity(snapshots.len());
        for (i, snapshot) in snapshots.into_iter().enumerate() {
            if snapshot.worker_id != i {
                return Err(RunError::WorkerIdMismatch {
                    expected: i,
                    found: snapshot.worker_id,
                });
            }
            strips.push(snapshot.rows);
        }
        Ok(GridResponse {
            grid: partition::assemble(strips)?,
            completed_turns: self.completed,
        })
    }

    async fn stop_workers(&self) {
        for (i, result) in join_all(self.workers.iter().map(WorkerClient::stop))
            .await
            .into_iter()
            .enumerate()
        {
            if let Err(e) = result {
                warn!(worker = i, "failed to stop worker: {e}");
            }
        }
    }
}
