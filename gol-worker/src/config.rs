use std::net::SocketAddr;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:8050")]
    pub address: SocketAddr,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,
}

impl Config {
    /// Applies the `--port` flag on top of the configured bind address.
    pub fn with_port(mut self, port: u16) -> Config {
        self.address.set_port(port);
        self
    }
}
