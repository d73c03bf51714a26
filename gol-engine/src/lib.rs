//! Engine service: partitions a grid across a pool of workers, owns the
//! turn loop that rotates halo rows between them, and multiplexes the
//! control plane (count, snapshot, pause, stop, reconnect) against it.

pub mod config;
pub mod error;
pub mod run;
pub mod server;
