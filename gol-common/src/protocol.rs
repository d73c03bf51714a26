//! JSON payloads exchanged between the controller, the engine, and the
//! workers. Every route owns a request/response pair here; the services
//! answer errors as plain-text bodies with a non-2xx status.

use serde::{Deserialize, Serialize};

use crate::grid::Grid;

/* Engine payloads */

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartRunRequest {
    pub grid: Grid,
    pub turns: u32,
    pub workers: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AliveCountResponse {
    pub count: u64,
    pub completed_turns: u32,
}

/// Served by both `/snapshot` and `/result`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridResponse {
    pub grid: Grid,
    pub completed_turns: u32,
}

/* Worker payloads */

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartStripRequest {
    /// Owned rows bracketed by the two initial halo rows.
    pub rows: Vec<Vec<u8>>,
    pub worker_id: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepRequest {
    pub top_halo: Vec<u8>,
    pub bottom_halo: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgesResponse {
    pub top_edge: Vec<u8>,
    pub bottom_edge: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StripSnapshotResponse {
    /// Owned rows only, halos stripped.
    pub rows: Vec<Vec<u8>>,
    pub worker_id: usize,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct WorkerAliveResponse {
    pub count: u64,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Empty {}
