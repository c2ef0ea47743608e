//! Background field builder.
//!
//! Requests go through a single-slot channel: a request submitted while a
//! build is running replaces any request still waiting, so at most one build
//! runs and at most one waits. Each result echoes the generation of the
//! request it answers; the animator drops results whose generation is no
//! longer current.

use std::sync::Arc;
use std::time::{Duration, Instant};

use flow_common::{CanvasBound, Extent, FlowError, FlowResult, GridData, VectorKeys};
use renderer::{build_field_columns, Columns};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Everything needed to build one field.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub generation: u64,
    pub data: Arc<GridData>,
    pub keys: VectorKeys,
    pub velocity_scale: f64,
    pub canvas_bound: CanvasBound,
    pub extent: Extent,
}

/// Result of one build.
#[derive(Debug)]
pub struct BuildOutcome {
    pub generation: u64,
    pub canvas_bound: CanvasBound,
    pub result: FlowResult<Columns>,
    pub elapsed: Duration,
}

/// Build the columns for a request on the current thread.
pub fn build_columns(request: &BuildRequest) -> FlowResult<Columns> {
    let coverage = request.data.to_coverage(&request.keys)?;
    build_field_columns(
        &coverage,
        &request.keys,
        request.velocity_scale,
        &request.canvas_bound,
        &request.extent,
    )
}

/// Handle to the builder task. Dropping it stops the task.
#[derive(Debug)]
pub struct FieldWorker {
    requests: watch::Sender<Option<BuildRequest>>,
    results: mpsc::UnboundedReceiver<BuildOutcome>,
    task: JoinHandle<()>,
}

impl FieldWorker {
    /// Spawn the builder on the current tokio runtime.
    pub fn spawn() -> FlowResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| FlowError::worker_unavailable(format!("no tokio runtime: {}", e)))?;
        let (request_tx, request_rx) = watch::channel(None);
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let task = runtime.spawn(run(request_rx, result_tx));
        Ok(Self {
            requests: request_tx,
            results: result_rx,
            task,
        })
    }

    /// Queue a request, replacing one that has not started yet.
    pub fn submit(&self, request: BuildRequest) -> FlowResult<()> {
        if self.requests.is_closed() || self.task.is_finished() {
            return Err(FlowError::worker_unavailable("field worker has stopped"));
        }
        debug!(generation = request.generation, "Submitting field build");
        self.requests.send_replace(Some(request));
        Ok(())
    }

    /// A finished build, if one is ready.
    pub fn try_next(&mut self) -> Option<BuildOutcome> {
        self.results.try_recv().ok()
    }

    /// Wait for the next finished build. `None` once the task has exited.
    pub async fn next(&mut self) -> Option<BuildOutcome> {
        self.results.recv().await
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for FieldWorker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut requests: watch::Receiver<Option<BuildRequest>>,
    results: mpsc::UnboundedSender<BuildOutcome>,
) {
    while requests.changed().await.is_ok() {
        let Some(request) = requests.borrow_and_update().clone() else {
            continue;
        };
        let generation = request.generation;
        let canvas_bound = request.canvas_bound;
        let start = Instant::now();

        let result = match tokio::task::spawn_blocking(move || build_columns(&request)).await {
            Ok(result) => result,
            Err(e) => {
                warn!(generation, error = %e, "Field build task panicked");
                Err(FlowError::worker_unavailable(format!("field build panicked: {}", e)))
            }
        };

        let outcome = BuildOutcome {
            generation,
            canvas_bound,
            result,
            elapsed: start.elapsed(),
        };
        if results.send(outcome).is_err() {
            break;
        }
    }
    debug!("Field worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_common::{RegularAxis, Viewport};
    use test_utils::uniform_coverage;

    fn request(generation: u64, data: Arc<GridData>) -> BuildRequest {
        let viewport = Viewport::new(32, 24, [0.0, 40.0], [16.0, 52.0], 6.0);
        BuildRequest {
            generation,
            data,
            keys: VectorKeys::default(),
            velocity_scale: 0.015,
            canvas_bound: viewport.canvas_bound(),
            extent: viewport.extent(),
        }
    }

    fn dataset() -> Arc<GridData> {
        Arc::new(uniform_coverage(
            RegularAxis::new(-10.0, 30.0, 9),
            RegularAxis::new(60.0, 30.0, 7),
            3.0,
            4.0,
        ))
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        assert!(matches!(
            FieldWorker::spawn(),
            Err(FlowError::WorkerUnavailable(_))
        ));
    }

    #[test]
    fn test_build_columns_inline() {
        let columns = build_columns(&request(1, dataset())).unwrap();
        assert_eq!(columns.column_count(), 16);
        assert!(!columns.is_empty());
    }

    #[tokio::test]
    async fn test_pending_requests_coalesce() {
        let mut worker = FieldWorker::spawn().unwrap();
        let data = dataset();
        // The worker task has not run yet, so only the last request survives.
        for generation in 1..=3 {
            worker.submit(request(generation, data.clone())).unwrap();
        }

        let outcome = worker.next().await.unwrap();
        assert_eq!(outcome.generation, 3);
        assert!(outcome.result.is_ok());

        let more = tokio::time::timeout(Duration::from_millis(50), worker.next()).await;
        assert!(more.is_err(), "coalesced requests must not be built");
    }

    #[tokio::test]
    async fn test_validation_error_is_reported() {
        let mut worker = FieldWorker::spawn().unwrap();
        let mut req = request(7, dataset());
        req.keys = VectorKeys::new("UGRD", "VGRD");
        worker.submit(req).unwrap();

        let outcome = worker.next().await.unwrap();
        assert_eq!(outcome.generation, 7);
        assert!(matches!(outcome.result, Err(FlowError::Validation(_))));
        assert!(worker.is_running());
    }

    #[tokio::test]
    async fn test_idle_worker_has_nothing_ready() {
        let mut worker = FieldWorker::spawn().unwrap();
        assert!(worker.try_next().is_none());
        let mut next = tokio_test::task::spawn(worker.next());
        tokio_test::assert_pending!(next.poll());
    }
}
