//! Worker service entry point.

use clap::Parser;
use envconfig::Envconfig;

use gol_worker::config::Config;
use gol_worker::server::serve;

#[derive(Parser)]
#[command(about = "Game of Life strip worker")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8050)]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::init_from_env()
        .expect("failed to load configuration from env")
        .with_port(args.port);

    let listener = tokio::net::TcpListener::bind(config.address)
        .await
        .expect("failed to bind worker address");

    if let Err(e) = serve(config, listener, std::future::pending()).await {
        tracing::error!("worker server exited: {}", e);
        std::process::exit(1);
    }
}
