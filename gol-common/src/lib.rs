//! Shared building blocks for the distributed Game of Life services:
//! the grid model, strip partitioning, the wire protocol, typed HTTP
//! clients, the controller event stream, and the liveness/metrics plumbing
//! every binary mounts.

pub mod client;
pub mod events;
pub mod grid;
pub mod health;
pub mod metrics;
pub mod partition;
pub mod protocol;
