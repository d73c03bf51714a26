use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use gol_common::client::ClientError;

use crate::run::RunError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("a run is already in progress")]
    Busy,
    #[error("no run in progress")]
    NotRunning,
    #[error("run was stopped before completing")]
    Canceled,
    #[error("worker call failed: {0}")]
    Worker(#[from] ClientError),
    #[error("run failed: {0}")]
    RunFailed(String),
}

impl From<RunError> for EngineError {
    fn from(error: RunError) -> EngineError {
        match error {
            RunError::Canceled => EngineError::Canceled,
            RunError::Worker(e) => EngineError::Worker(e),
            other => EngineError::RunFailed(other.to_string()),
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        match self {
            EngineError::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            EngineError::Busy | EngineError::NotRunning => {
                (StatusCode::CONFLICT, self.to_string())
            }
            EngineError::Canceled => (StatusCode::GONE, self.to_string()),
            EngineError::Worker(_) | EngineError::RunFailed(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
        }
        .into_response()
    }
}
