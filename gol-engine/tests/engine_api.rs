//! Full-stack scenarios: a real engine server coordinating real worker
//! servers over ephemeral listeners.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::StatusCode;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use gol_common::client::{EngineClient, WorkerClient};
use gol_common::grid::{Cell, Grid, ALIVE, DEAD};

static HTTP: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

struct Cluster {
    engine_address: String,
    worker_addresses: Vec<String>,
    shutdowns: Vec<Arc<Notify>>,
}

impl Cluster {
    /// Binds `workers` worker servers plus one engine wired to them, all
    /// on ephemeral ports.
    async fn spawn(workers: usize) -> Cluster {
        let mut worker_addresses = Vec::new();
        let mut shutdowns = Vec::new();

        for _ in 0..workers {
            let config = gol_worker::config::Config {
                address: "127.0.0.1:0".parse().unwrap(),
                export_prometheus: false,
            };
            let listener = TcpListener::bind(config.address).await.unwrap();
            worker_addresses.push(listener.local_addr().unwrap().to_string());
            let notify = Arc::new(Notify::new());
            shutdowns.push(notify.clone());
            tokio::spawn(async move {
                gol_worker::server::serve(config, listener, async move {
                    notify.notified().await
                })
                .await
            });
        }

        let config = gol_engine::config::Config {
            address: "127.0.0.1:0".parse().unwrap(),
            worker_addresses: worker_addresses.join(","),
            export_prometheus: false,
        };
        let listener = TcpListener::bind(config.address).await.unwrap();
        let engine_address = listener.local_addr().unwrap().to_string();
        let notify = Arc::new(Notify::new());
        shutdowns.push(notify.clone());
        tokio::spawn(async move {
            gol_engine::server::serve(config, listener, async move { notify.notified().await })
                .await
        });

        Cluster {
            engine_address,
            worker_addresses,
            shutdowns,
        }
    }

    fn engine(&self) -> EngineClient {
        EngineClient::new(&self.engine_address)
    }

    fn worker(&self, id: usize) -> WorkerClient {
        WorkerClient::new(HTTP.clone(), &self.worker_addresses[id])
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        for shutdown in &self.shutdowns {
            shutdown.notify_one();
        }
    }
}

fn grid_with(height: usize, width: usize, alive: &[(usize, usize)]) -> Grid {
    let mut grid = Grid::dead(height, width);
    for &(x, y) in alive {
        grid.set(x, y, ALIVE);
    }
    grid
}

fn random_grid(height: usize, width: usize, seed: u64) -> Grid {
    let mut rng = StdRng::seed_from_u64(seed);
    Grid {
        rows: (0..height)
            .map(|_| {
                (0..width)
                    .map(|_| if rng.gen_bool(0.5) { ALIVE } else { DEAD })
                    .collect()
            })
            .collect(),
    }
}

fn sorted_cells(cells: &[(usize, usize)]) -> Vec<Cell> {
    let mut cells: Vec<Cell> = cells.iter().map(|&(x, y)| Cell { x, y }).collect();
    cells.sort();
    cells
}

fn alive_sorted(grid: &Grid) -> Vec<Cell> {
    let mut cells = grid.alive_cells();
    cells.sort();
    cells
}

async fn wait_until_idle(engine: &EngineClient) {
    for _ in 0..100 {
        if !engine.status().await.expect("status failed").running {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("engine never went idle");
}

#[tokio::test]
async fn blinker_oscillates_across_two_runs() {
    let cluster = Cluster::spawn(1).await;
    let engine = cluster.engine();
    let blinker = grid_with(5, 5, &[(2, 1), (2, 2), (2, 3)]);

    engine.start_run(&blinker, 1, 1).await.expect("start failed");
    let after_one = engine.result().await.expect("result failed");
    assert_eq!(after_one.completed_turns, 1);
    assert_eq!(
        alive_sorted(&after_one.grid),
        sorted_cells(&[(1, 2), (2, 2), (3, 2)])
    );

    engine.start_run(&blinker, 2, 1).await.expect("start failed");
    let after_two = engine.result().await.expect("result failed");
    assert_eq!(after_two.completed_turns, 2);
    assert_eq!(after_two.grid, blinker);
}

#[tokio::test]
async fn still_life_survives_a_hundred_turns_on_two_workers() {
    let cluster = Cluster::spawn(2).await;
    let engine = cluster.engine();
    let block = grid_with(4, 4, &[(1, 1), (2, 1), (1, 2), (2, 2)]);

    engine.start_run(&block, 100, 2).await.expect("start failed");
    let result = engine.result().await.expect("result failed");
    assert_eq!(result.completed_turns, 100);
    assert_eq!(result.grid, block);
}

#[tokio::test]
async fn glider_wraps_around_the_torus_on_four_workers() {
    let cluster = Cluster::spawn(4).await;
    let engine = cluster.engine();
    let glider = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)];
    let start = grid_with(8, 8, &glider);

    // One period: the glider translates one cell diagonally.
    engine.start_run(&start, 4, 4).await.expect("start failed");
    let result = engine.result().await.expect("result failed");
    let shifted: Vec<(usize, usize)> = glider
        .iter()
        .map(|&(x, y)| ((x + 1) % 8, (y + 1) % 8))
        .collect();
    assert_eq!(alive_sorted(&result.grid), sorted_cells(&shifted));

    // 32 turns straddle the seam repeatedly; the distributed answer must
    // match the single-process stencil pointwise.
    let mut reference = start.clone();
    for _ in 0..32 {
        reference = reference.step();
    }
    engine.start_run(&start, 32, 4).await.expect("start failed");
    let result = engine.result().await.expect("result failed");
    assert_eq!(result.completed_turns, 32);
    assert_eq!(result.grid, reference);
}

#[tokio::test]
async fn empty_grid_stays_empty() {
    let cluster = Cluster::spawn(3).await;
    let engine = cluster.engine();
    let empty = Grid::dead(16, 16);

    engine.start_run(&empty, 50, 3).await.expect("start failed");
    let result = engine.result().await.expect("result failed");
    assert_eq!(result.completed_turns, 50);
    assert_eq!(result.grid, empty);
    assert_eq!(result.grid.alive_count(), 0);
}

#[tokio::test]
async fn distributed_matches_reference_for_uneven_splits() {
    let cluster = Cluster::spawn(3).await;
    let engine = cluster.engine();
    // Height 7 splits as 7, 3+4, and 2+2+3.
    let seed = random_grid(7, 12, 42);
    let mut reference = seed.clone();
    for _ in 0..5 {
        reference = reference.step();
    }

    for workers in 1..=3 {
        engine
            .start_run(&seed, 5, workers)
            .await
            .expect("start failed");
        let result = engine.result().await.expect("result failed");
        assert_eq!(result.completed_turns, 5);
        assert_eq!(result.grid, reference, "diverged with {workers} workers");
    }
}

#[tokio::test]
async fn zero_turns_returns_the_grid_unchanged() {
    let cluster = Cluster::spawn(2).await;
    let engine = cluster.engine();
    let seed = random_grid(6, 6, 7);

    engine.start_run(&seed, 0, 2).await.expect("start failed");
    assert!(!engine.status().await.expect("status failed").running);

    let result = engine.result().await.expect("result failed");
    assert_eq!(result.completed_turns, 0);
    assert_eq!(result.grid, seed);
}

#[tokio::test]
async fn stop_cancels_a_long_run() {
    let cluster = Cluster::spawn(4).await;
    let engine = cluster.engine();
    let seed = random_grid(64, 64, 1234);

    engine
        .start_run(&seed, 100_000, 4)
        .await
        .expect("start failed");
    assert!(engine.status().await.expect("status failed").running);

    let stopped = engine.stop().await.expect("stop failed");
    assert_eq!(stopped.message, "Stopping engine");

    let err = engine.result().await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::GONE));

    wait_until_idle(&engine).await;
}

#[tokio::test]
async fn pause_blocks_turns_but_serves_counts_and_snapshots() {
    let cluster = Cluster::spawn(2).await;
    let engine = cluster.engine();
    let seed = random_grid(16, 16, 99);

    engine
        .start_run(&seed, 1_000_000, 2)
        .await
        .expect("start failed");

    let paused = engine.pause().await.expect("pause failed");
    assert!(paused.message.starts_with("Pausing on turn"));

    // A second pause without a resume is a no-op.
    let again = engine.pause().await.expect("second pause failed");
    assert!(again.message.starts_with("Already paused"));

    // Snapshot then count without an intervening turn: they must agree.
    let snapshot = engine.snapshot().await.expect("snapshot failed");
    let alive = engine.alive_count().await.expect("alive count failed");
    assert_eq!(alive.completed_turns, snapshot.completed_turns);
    assert_eq!(alive.count, snapshot.grid.alive_count());
    assert_eq!(snapshot.grid.height(), 16);
    assert_eq!(snapshot.grid.width(), 16);

    let resumed = engine.resume().await.expect("resume failed");
    assert_eq!(resumed.message, "Continuing");

    engine.stop().await.expect("stop failed");
    let err = engine.result().await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::GONE));
    wait_until_idle(&engine).await;
}

#[tokio::test]
async fn start_is_rejected_while_running() {
    let cluster = Cluster::spawn(1).await;
    let engine = cluster.engine();
    let seed = random_grid(8, 8, 3);

    engine
        .start_run(&seed, 1_000_000, 1)
        .await
        .expect("start failed");

    let err = engine.start_run(&seed, 10, 1).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));

    engine.stop().await.expect("stop failed");
    let _unused = engine.result().await;
    wait_until_idle(&engine).await;
}

#[tokio::test]
async fn invalid_runs_are_rejected_up_front() {
    let cluster = Cluster::spawn(4).await;
    let engine = cluster.engine();

    // Empty grid.
    let err = engine
        .start_run(&Grid { rows: vec![] }, 10, 2)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));

    // Fewer rows than workers.
    let err = engine
        .start_run(&Grid::dead(2, 2), 10, 3)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));

    // Zero workers.
    let err = engine
        .start_run(&Grid::dead(4, 4), 10, 0)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));

    // More workers than configured endpoints.
    let err = engine
        .start_run(&Grid::dead(8, 8), 10, 5)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));

    // Nothing above may have started a run.
    assert!(!engine.status().await.expect("status failed").running);
    let err = engine.result().await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
}

#[tokio::test]
async fn unreachable_worker_fails_start_as_invalid_input() {
    // An engine whose endpoint table points at a port nothing listens
    // on: the grid and partition are valid, the dial is not.
    let config = gol_engine::config::Config {
        address: "127.0.0.1:0".parse().unwrap(),
        worker_addresses: "127.0.0.1:9".to_string(),
        export_prometheus: false,
    };
    let listener = TcpListener::bind(config.address).await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let shutdown = Arc::new(Notify::new());
    let notify = shutdown.clone();
    tokio::spawn(async move {
        gol_engine::server::serve(config, listener, async move { notify.notified().await }).await
    });

    let engine = EngineClient::new(&address);
    let err = engine
        .start_run(&Grid::dead(4, 4), 10, 1)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));

    // The failure happened before the run became Running.
    assert!(!engine.status().await.expect("status failed").running);

    shutdown.notify_one();
}

#[tokio::test]
async fn reconnect_is_advisory_and_requires_a_live_run() {
    let cluster = Cluster::spawn(1).await;
    let engine = cluster.engine();

    let err = engine.reconnect().await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));

    let seed = random_grid(8, 8, 5);
    engine
        .start_run(&seed, 1_000_000, 1)
        .await
        .expect("start failed");

    engine.reconnect().await.expect("reconnect failed");
    assert!(engine.status().await.expect("status failed").running);

    // A reconnected controller consumes the same run's outcome.
    engine.stop().await.expect("stop failed");
    let err = engine.result().await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::GONE));
    wait_until_idle(&engine).await;
}

#[tokio::test]
async fn stop_workers_releases_every_strip() {
    let cluster = Cluster::spawn(2).await;
    let engine = cluster.engine();
    let seed = random_grid(6, 6, 11);

    engine.start_run(&seed, 3, 2).await.expect("start failed");
    engine.result().await.expect("result failed");

    // Workers keep their strips after a completed run, ready for
    // inspection, until told otherwise.
    cluster.worker(0).snapshot().await.expect("snapshot failed");

    engine.stop_workers().await.expect("stop workers failed");
    let err = cluster.worker(0).snapshot().await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    let err = cluster.worker(1).snapshot().await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
}
