//! Engine service entry point.

use clap::Parser;
use envconfig::Envconfig;

use gol_engine::config::Config;
use gol_engine::server::serve;

#[derive(Parser)]
#[command(about = "Game of Life distribution engine")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8030)]
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
        .expect("failed to bind engine address");

    if let Err(e) = serve(config, listener, std::future::pending()).await {
        tracing::error!("engine server exited: {}", e);
        std::process::exit(1);
    }
}
