//! Background data actor: fetches datasets and computes interpolation plans.
//!
//! Each request runs on its own task, so a slow fetch never holds up a
//! later one. Responses echo the key (or plan id) of their request; deciding
//! whether a response is still wanted is left to the receiver.

use std::sync::Arc;

use flow_common::{FlowError, FlowResult, GridData, VectorKeys};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::TransitionConfig;
use crate::interpolate::{interpolate_data, InterpolationPlan};
use crate::source::GridSource;

#[derive(Debug, Clone)]
pub enum DataRequest {
    Fetch {
        key: String,
    },
    Interpolate {
        id: u64,
        from: Arc<GridData>,
        to: Arc<GridData>,
    },
}

#[derive(Debug)]
pub enum DataResponse {
    Fetched {
        key: String,
        result: FlowResult<GridData>,
    },
    Interpolated {
        id: u64,
        to: Arc<GridData>,
        result: FlowResult<InterpolationPlan>,
    },
}

/// Handle to the actor. Dropping it stops accepting requests.
#[derive(Debug)]
pub struct DataActor {
    requests: mpsc::UnboundedSender<DataRequest>,
    responses: mpsc::UnboundedReceiver<DataResponse>,
}

impl DataActor {
    /// Spawn the actor on the current tokio runtime.
    pub fn spawn(
        source: Arc<dyn GridSource>,
        keys: VectorKeys,
        config: TransitionConfig,
    ) -> FlowResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| FlowError::worker_unavailable(format!("no tokio runtime: {}", e)))?;
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        runtime.spawn(run(request_rx, response_tx, source, keys, config));
        Ok(Self {
            requests: request_tx,
            responses: response_rx,
        })
    }

    pub fn send(&self, request: DataRequest) -> FlowResult<()> {
        self.requests
            .send(request)
            .map_err(|_| FlowError::worker_unavailable("data actor has stopped"))
    }

    pub async fn next(&mut self) -> Option<DataResponse> {
        self.responses.recv().await
    }
}

async fn run(
    mut requests: mpsc::UnboundedReceiver<DataRequest>,
    responses: mpsc::UnboundedSender<DataResponse>,
    source: Arc<dyn GridSource>,
    keys: VectorKeys,
    config: TransitionConfig,
) {
    while let Some(request) = requests.recv().await {
        let responses = responses.clone();
        match request {
            DataRequest::Fetch { key } => {
                let source = source.clone();
                tokio::spawn(async move {
                    let result = source.fetch(&key).await;
                    debug!(key = %key, ok = result.is_ok(), "Fetch finished");
                    let _ = responses.send(DataResponse::Fetched { key, result });
                });
            }
            DataRequest::Interpolate { id, from, to } => {
                let keys = keys.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    let target = to.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        interpolate_data(&from, &to, &keys, &config)
                    })
                    .await
                    .unwrap_or_else(|e| {
                        warn!(id, error = %e, "Interpolation task panicked");
                        Err(FlowError::worker_unavailable(format!("interpolation panicked: {}", e)))
                    });
                    let _ = responses.send(DataResponse::Interpolated {
                        id,
                        to: target,
                        result,
                    });
                });
            }
        }
    }
    debug!("Data actor stopped");
}
