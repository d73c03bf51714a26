use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WorkerError {
    #[error("invalid strip: {0}")]
    InvalidInput(String),
    #[error("worker has not been started")]
    NotInitialized,
}

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        match self {
            WorkerError::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            WorkerError::NotInitialized => (StatusCode::CONFLICT, self.to_string()),
        }
        .into_response()
    }
}
