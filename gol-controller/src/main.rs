//! Session controller: starts (or reattaches to) a run on the engine,
//! heartbeats alive-cell counts, forwards keystrokes, and consumes the
//! final result.

use std::path::PathBuf;

use clap::Parser;

mod session;
mod store;

#[derive(Parser)]
#[command(version, about = "Game of Life session controller")]
pub struct Args {
    /// host:port of the engine to drive.
    #[arg(long, default_value = "127.0.0.1:8030")]
    pub server: String,

    /// Reattach to a run already in progress instead of starting fresh.
    #[arg(long, default_value_t = false)]
    pub reconnect: bool,

    /// Number of turns to evolve.
    #[arg(long, default_value_t = 10_000_000)]
    pub turns: u32,

    /// Grid width.
    #[arg(long, default_value_t = 512)]
    pub w: usize,

    /// Grid height.
    #[arg(long, default_value_t = 512)]
    pub h: usize,

    /// Number of workers to spread the grid across.
    #[arg(long, default_value_t = 2)]
    pub workers: usize,

    /// Directory the grid store reads from and writes to.
    #[arg(long, default_value = "images")]
    pub images: PathBuf,
}

#[tokio::main]
async fn main() {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    let args = Args::parse();
    if let Err(e) = session::run(args).await {
        tracing::error!("session failed: {e:#}");
        std::process::exit(1);
    }
}
