use std::net::SocketAddr;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:8030")]
    pub address: SocketAddr,

    /// The worker endpoint table: worker id i dials the i-th entry.
    /// Configuration only; there is no discovery.
    #[envconfig(
        default = "127.0.0.1:8050,127.0.0.1:8051,127.0.0.1:8052,127.0.0.1:8053"
    )]
    pub worker_addresses: String,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,
}

impl Config {
    pub fn worker_endpoints(&self) -> Vec<String> {
        self.worker_addresses
            .split(',')
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Applies the `--port` flag on top of the configured bind address.
    pub fn with_port(mut self, port: u16) -> Config {
        self.address.set_port(port);
        self
    }
}
