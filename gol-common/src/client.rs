//! Typed HTTP clients for the worker and engine services.

use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::grid::Grid;
use crate::protocol::{
    AliveCountResponse, EdgesResponse, Empty, GridResponse, MessageResponse, StartRunRequest,
    StartStripRequest, StatusResponse, StepRequest, StripSnapshotResponse, WorkerAliveResponse,
};

/// Budget for control-plane calls. Step, Start, and GetResult have no
/// timeout: a long turn is not an error.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{url} returned {status}: {message}")]
    Api {
        url: String,
        status: StatusCode,
        message: String,
    },
}

impl ClientError {
    /// Status code of an API rejection, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(_) => None,
        }
    }
}

/// Folds a non-2xx response into `ClientError::Api`, carrying the
/// service's plain-text diagnostic.
async fn checked(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let message = response.text().await.unwrap_or_default();
    Err(ClientError::Api {
        url,
        status,
        message,
    })
}

/// Client for one worker endpoint. Workers serve one request at a time;
/// callers rely on that for snapshot/step exclusion.
#[derive(Clone)]
pub struct WorkerClient {
    client: reqwest::Client,
    base: String,
}

impl WorkerClient {
    pub fn new(client: reqwest::Client, address: &str) -> WorkerClient {
        WorkerClient {
            client,
            base: format!("http://{address}"),
        }
    }

    pub async fn start(
        &self,
        rows: Vec<Vec<u8>>,
        worker_id: usize,
    ) -> Result<EdgesResponse, ClientError> {
        let response = self
            .client
            .post(format!("{}/start", self.base))
            .json(&StartStripRequest { rows, worker_id })
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    pub async fn step(
        &self,
        top_halo: Vec<u8>,
        bottom_halo: Vec<u8>,
    ) -> Result<EdgesResponse, ClientError> {
        let response = self
            .client
            .post(format!("{}/step", self.base))
            .json(&StepRequest {
                top_halo,
                bottom_halo,
            })
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    pub async fn snapshot(&self) -> Result<StripSnapshotResponse, ClientError> {
        let response = self
            .client
            .get(format!("{}/snapshot", self.base))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    pub async fn alive_count(&self) -> Result<WorkerAliveResponse, ClientError> {
        let response = self
            .client
            .get(format!("{}/alive", self.base))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    pub async fn stop(&self) -> Result<Empty, ClientError> {
        let response = self
            .client
            .post(format!("{}/stop", self.base))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }
}

/// Client for the engine's control plane, used by the controller and by
/// integration tests.
#[derive(Clone)]
pub struct EngineClient {
    client: reqwest::Client,
    base: String,
}

impl EngineClient {
    pub fn new(address: &str) -> EngineClient {
        EngineClient {
            client: reqwest::Client::new(),
            base: format!("http://{address}"),
        }
    }

    pub async fn start_run(
        &self,
        grid: &Grid,
        turns: u32,
        workers: usize,
    ) -> Result<MessageResponse, ClientError> {
        let response = self
            .client
            .post(format!("{}/run", self.base))
            .json(&StartRunRequest {
                grid: grid.clone(),
                turns,
                workers,
            })
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    /// Blocks until the run completes or is stopped; deliberately has no
    /// client-side timeout.
    pub async fn result(&self) -> Result<GridResponse, ClientError> {
        let response = self.client.get(format!("{}/result", self.base)).send().await?;
        Ok(checked(response).await?.json().await?)
    }

    pub async fn alive_count(&self) -> Result<AliveCountResponse, ClientError> {
        let response = self
            .client
            .get(format!("{}/alive", self.base))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    pub async fn snapshot(&self) -> Result<GridResponse, ClientError> {
        let response = self
            .client
            .get(format!("{}/snapshot", self.base))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    pub async fn pause(&self) -> Result<MessageResponse, ClientError> {
        self.post_message("pause").await
    }

    pub async fn resume(&self) -> Result<MessageResponse, ClientError> {
        self.post_message("resume").await
    }

    pub async fn stop(&self) -> Result<MessageResponse, ClientError> {
        self.post_message("stop").await
    }

    pub async fn reconnect(&self) -> Result<MessageResponse, ClientError> {
        self.post_message("reconnect").await
    }

    pub async fn stop_workers(&self) -> Result<MessageResponse, ClientError> {
        self.post_message("workers/stop").await
    }

    pub async fn status(&self) -> Result<StatusResponse, ClientError> {
        let response = self
            .client
            .get(format!("{}/status", self.base))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    async fn post_message(&self, path: &str) -> Result<MessageResponse, ClientError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.base))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }
}
