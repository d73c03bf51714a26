use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use gol_common::client::EngineClient;
use gol_common::events::{Event, State};

use crate::store::GridStore;
use crate::Args;

pub async fn run(args: Args) -> anyhow::Result<()> {
    let engine = EngineClient::new(&args.server);
    let store = GridStore::new(args.images.clone());

    let status = engine
        .status()
        .await
        .with_context(|| format!("failed to dial engine at {}", args.server))?;

    if args.reconnect {
        if !status.running {
            bail!("no run in progress to reconnect to at {}", args.server);
        }
        let ack = engine.reconnect().await.context("reconnect rejected")?;
        info!("{}", ack.message);
    } else {
        if status.running {
            // A previous controller left a run going; retire it first.
            match engine.stop().await {
                Ok(reply) => info!("{}", reply.message),
                Err(e) => warn!("failed to stop previous run: {e}"),
            }
            wait_until_idle(&engine).await?;
        }
        let grid = store
            .load_or_random(args.h, args.w)
            .await
            .context("failed to load initial grid")?;
        let ack = engine
            .start_run(&grid, args.turns, args.workers)
            .await
            .context("failed to start run")?;
        info!("{}", ack.message);
    }

    let (events, events_rx) = mpsc::unbounded_channel();
    let front_end = tokio::spawn(render_events(events_rx));

    // Last turn number any reply mentioned; stamps the Quitting event.
    let completed = Arc::new(AtomicU32::new(0));

    let (ticker_stop, ticker_stopped) = watch::channel(false);
    let ticker = tokio::spawn(heartbeat(
        engine.clone(),
        events.clone(),
        completed.clone(),
        ticker_stopped,
    ));

    let (quit, mut quit_requested) = mpsc::channel::<()>(1);
    let keys = tokio::spawn(keyboard(
        engine.clone(),
        store.clone(),
        events.clone(),
        completed.clone(),
        quit,
    ));

    let outcome = tokio::select! {
        result = engine.result() => Some(result),
        _ = quit_requested.recv() => None,
    };

    // Park the ticker before tearing the event stream down, so it never
    // races a closed channel.
    _ = ticker_stop.send(true);
    let _unused = ticker.await;
    keys.abort();

    let exit = match outcome {
        Some(Ok(result)) => {
            completed.store(result.completed_turns, Ordering::Relaxed);
            store
                .save(&result.grid, result.completed_turns)
                .await
                .context("failed to write final grid")?;
            let _unused = events.send(Event::FinalTurnComplete {
                completed_turns: result.completed_turns,
                alive: result.grid.alive_cells(),
            });
            Ok(())
        }
        Some(Err(e)) => Err(anyhow::Error::new(e).context("run failed")),
        None => {
            info!("disconnecting, the run continues server-side");
            Ok(())
        }
    };

    let _unused = events.send(Event::StateChange {
        completed_turns: completed.load(Ordering::Relaxed),
        state: State::Quitting,
    });
    drop(events);
    let _unused = front_end.await;

    exit
}

/// The engine only observes a stop at the next turn boundary; give it a
/// moment before starting over.
async fn wait_until_idle(engine: &EngineClient) -> anyhow::Result<()> {
    for _ in 0..100 {
        if !engine.status().await.context("status poll failed")?.running {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    bail!("engine still busy after stopping the previous run");
}

/// Stand-in for the graphical front-end: render the event stream as log
/// lines until the channel closes.
async fn render_events(mut events: mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = events.recv().await {
        info!(target: "events", "{event}");
    }
}

async fn heartbeat(
    engine: EngineClient,
    events: mpsc::UnboundedSender<Event>,
    completed: Arc<AtomicU32>,
    mut stopped: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(2));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match engine.alive_count().await {
                    Ok(alive) => {
                        completed.store(alive.completed_turns, Ordering::Relaxed);
                        let _unused = events.send(Event::AliveCellsCount {
                            completed_turns: alive.completed_turns,
                            count: alive.count,
                        });
                    }
                    // The run may have just completed; the result path reports.
                    Err(e) => debug!("alive count unavailable: {e}"),
                }
            }
            _ = stopped.changed() => return,
        }
    }
}

async fn keyboard(
    engine: EngineClient,
    store: GridStore,
    events: mpsc::UnboundedSender<Event>,
    completed: Arc<AtomicU32>,
    quit: mpsc::Sender<()>,
) {
    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 1];
    let mut paused = false;
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        match buf[0] {
            b's' => match engine.snapshot().await {
                Ok(snapshot) => {
                    completed.store(snapshot.completed_turns, Ordering::Relaxed);
                    match store.save(&snapshot.grid, snapshot.completed_turns).await {
                        Ok(()) => info!("snapshot written for turn {}", snapshot.completed_turns),
                        Err(e) => warn!("failed to write snapshot: {e}"),
                    }
                }
                Err(e) => warn!("snapshot failed: {e}"),
            },
            b'q' => {
                _ = quit.send(()).await;
                return;
            }
            b'p' => {
                let request = if paused {
                    engine.resume().await
                } else {
                    engine.pause().await
                };
                match request {
                    Ok(reply) => {
                        paused = !paused;
                        info!("{}", reply.message);
                        let _unused = events.send(Event::StateChange {
                            completed_turns: completed.load(Ordering::Relaxed),
                            state: if paused { State::Paused } else { State::Executing },
                        });
                    }
                    Err(e) => warn!("pause toggle failed: {e}"),
                }
            }
            _ => {}
        }
    }
}
