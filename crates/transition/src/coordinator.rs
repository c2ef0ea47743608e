//! Dataset transitions: supersession, interpolation and timed playback.
//!
//! The coordinator runs on its own task. `goto` marks a key as the only
//! wanted dataset; a fetch that completes for any other key is dropped.
//! A new dataset arriving while a field is shown is morphed in through an
//! [`InterpolationPlan`] played back on a timer. Any newer transition
//! abandons the running playback.

use std::sync::Arc;

use animator::{AnimatorHandle, AnimatorState};
use async_trait::async_trait;
use flow_common::time::format_dtg;
use flow_common::{FlowError, FlowResult, GridData, VectorKeys};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::actor::{DataActor, DataRequest, DataResponse};
use crate::config::TransitionConfig;
use crate::interpolate::{interpolate_data, InterpolationPlan};
use crate::source::GridSource;

/// What the coordinator feeds datasets into.
#[async_trait]
pub trait TransitionTarget: Send + Sync + 'static {
    async fn set_data(&self, data: Option<Arc<GridData>>) -> FlowResult<()>;

    /// Whether a field is being shown, so a change should be animated.
    async fn is_active(&self) -> bool;
}

#[async_trait]
impl TransitionTarget for AnimatorHandle {
    async fn set_data(&self, data: Option<Arc<GridData>>) -> FlowResult<()> {
        AnimatorHandle::set_data(self, data)
    }

    async fn is_active(&self) -> bool {
        match self.status().await {
            Ok(status) => status.viewport.is_some() && status.state != AnimatorState::Stopped,
            Err(_) => false,
        }
    }
}

/// Published after every step of the coordinator loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorStatus {
    pub wanted_key: Option<String>,
    /// Dtg of the dataset last handed to the target.
    pub current_dtg: Option<String>,
    pub has_data: bool,
    pub playing: bool,
    /// Datasets handed to the target so far.
    pub applied: u64,
}

enum Command {
    Goto(Option<String>),
    AssignData {
        data: Option<Arc<GridData>>,
        transform: bool,
    },
    Shutdown(oneshot::Sender<()>),
}

struct Playback {
    data: Vec<Arc<GridData>>,
    next: usize,
    delay: std::time::Duration,
    deadline: Instant,
}

#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<CoordinatorStatus>,
}

impl CoordinatorHandle {
    pub fn spawn(
        target: Arc<dyn TransitionTarget>,
        source: Arc<dyn GridSource>,
        keys: VectorKeys,
        config: TransitionConfig,
    ) -> FlowResult<Self> {
        config.validate()?;
        let actor = if config.use_background {
            Some(DataActor::spawn(source.clone(), keys.clone(), config.clone())?)
        } else {
            None
        };
        info!(
            source = %source.describe(),
            background = actor.is_some(),
            "Starting transition coordinator"
        );

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(CoordinatorStatus::default());
        let coordinator = Coordinator {
            target,
            source,
            keys,
            config,
            actor,
            wanted: None,
            current: None,
            playback: None,
            plan_id: 0,
            pending_plan: None,
            applied: 0,
            status: status_tx,
        };
        tokio::spawn(coordinator.run(command_rx));
        Ok(Self {
            commands: command_tx,
            status: status_rx,
        })
    }

    fn send(&self, command: Command) -> FlowResult<()> {
        self.commands
            .send(command)
            .map_err(|_| FlowError::worker_unavailable("coordinator has stopped"))
    }

    /// Show the dataset for `key`; `None` clears the data.
    pub fn goto(&self, key: Option<&str>) -> FlowResult<()> {
        self.send(Command::Goto(key.map(str::to_string)))
    }

    /// Hand over a dataset directly, animating the change when `transform`
    /// is set and a field is showing.
    pub fn assign_data(&self, data: Option<Arc<GridData>>, transform: bool) -> FlowResult<()> {
        self.send(Command::AssignData { data, transform })
    }

    pub fn status(&self) -> CoordinatorStatus {
        self.status.borrow().clone()
    }

    /// Resolve once the published status satisfies `pred`.
    pub async fn wait_until<F>(&self, mut pred: F) -> FlowResult<CoordinatorStatus>
    where
        F: FnMut(&CoordinatorStatus) -> bool,
    {
        let mut rx = self.status.clone();
        let status = rx
            .wait_for(|s| pred(s))
            .await
            .map_err(|_| FlowError::worker_unavailable("coordinator has stopped"))?;
        Ok(status.clone())
    }

    pub async fn shutdown(&self) -> FlowResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(tx))?;
        rx.await
            .map_err(|_| FlowError::worker_unavailable("coordinator ended early"))
    }
}

struct Coordinator {
    target: Arc<dyn TransitionTarget>,
    source: Arc<dyn GridSource>,
    keys: VectorKeys,
    config: TransitionConfig,
    actor: Option<DataActor>,
    wanted: Option<String>,
    /// Last dataset handed to the target.
    current: Option<Arc<GridData>>,
    playback: Option<Playback>,
    plan_id: u64,
    pending_plan: Option<u64>,
    applied: u64,
    status: watch::Sender<CoordinatorStatus>,
}

impl Coordinator {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let deadline = self.playback.as_ref().map(|p| p.deadline);

            tokio::select! {
                // Queued commands supersede results already in flight.
                biased;
                command = commands.recv() => {
                    match command {
                        None => break,
                        Some(Command::Goto(key)) => self.goto(key).await,
                        Some(Command::AssignData { data, transform }) => {
                            self.assign_data(data, transform).await
                        }
                        Some(Command::Shutdown(reply)) => {
                            self.playback = None;
                            let _ = reply.send(());
                            break;
                        }
                    }
                }
                response = next_response(&mut self.actor) => {
                    match response {
                        Some(response) => self.handle_response(response).await,
                        None => {
                            warn!("Data actor exited, fetching inline");
                            self.actor = None;
                        }
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.play_next().await;
                }
            }
            self.publish();
        }
        debug!("Transition coordinator stopped");
    }

    async fn goto(&mut self, key: Option<String>) {
        self.wanted = key.clone();
        let Some(key) = key else {
            self.assign_data(None, false).await;
            return;
        };
        debug!(key = %key, "Goto");

        if let Some(actor) = &self.actor {
            match actor.send(DataRequest::Fetch { key: key.clone() }) {
                Ok(()) => return,
                Err(e) => {
                    warn!(error = %e, "Data actor unavailable, fetching inline");
                    self.actor = None;
                }
            }
        }
        let result = self.source.fetch(&key).await;
        self.fetched(key, result).await;
    }

    async fn fetched(&mut self, key: String, result: FlowResult<GridData>) {
        if self.wanted.as_deref() != Some(key.as_str()) {
            metrics::counter!("flow_stale_results_dropped_total").increment(1);
            debug!(key = %key, wanted = ?self.wanted, "Dropping superseded fetch");
            return;
        }
        match result {
            Ok(data) => self.assign_data(Some(Arc::new(data)), true).await,
            Err(e) => {
                warn!(key = %key, error = %e, "Fetch failed, keeping current data");
            }
        }
    }

    async fn assign_data(&mut self, data: Option<Arc<GridData>>, transform: bool) {
        // Last writer wins.
        self.playback = None;
        self.pending_plan = None;

        let Some(to) = data else {
            self.apply(None).await;
            return;
        };

        let from = match self.current.clone() {
            Some(from) if transform => from,
            _ => {
                self.apply(Some(to)).await;
                return;
            }
        };
        if !self.target.is_active().await {
            self.apply(Some(to)).await;
            return;
        }

        self.plan_id += 1;
        let id = self.plan_id;
        if let Some(actor) = &self.actor {
            let request = DataRequest::Interpolate {
                id,
                from: from.clone(),
                to: to.clone(),
            };
            if actor.send(request).is_ok() {
                self.pending_plan = Some(id);
                return;
            }
            warn!("Data actor unavailable, interpolating inline");
            self.actor = None;
        }
        let result = interpolate_data(&from, &to, &self.keys, &self.config);
        self.planned(to, result).await;
    }

    async fn handle_response(&mut self, response: DataResponse) {
        match response {
            DataResponse::Fetched { key, result } => self.fetched(key, result).await,
            DataResponse::Interpolated { id, to, result } => {
                if self.pending_plan != Some(id) {
                    metrics::counter!("flow_stale_results_dropped_total").increment(1);
                    debug!(id, "Dropping superseded interpolation");
                    return;
                }
                self.pending_plan = None;
                self.planned(to, result).await;
            }
        }
    }

    async fn planned(&mut self, to: Arc<GridData>, result: FlowResult<InterpolationPlan>) {
        match result {
            Ok(plan) => self.transform(plan).await,
            Err(e) => {
                warn!(error = %e, "Interpolation failed, cutting to new data");
                self.apply(Some(to)).await;
            }
        }
    }

    /// Start playing a plan, or cut to its target when it has no speed.
    async fn transform(&mut self, plan: InterpolationPlan) {
        let Some(speed) = plan.speed else {
            if let Some(last) = plan.target().cloned() {
                self.apply(Some(last)).await;
            }
            return;
        };
        info!(
            steps = plan.intermediate_count(),
            to = ?plan.to_dtg,
            "Playing transition"
        );
        self.playback = Some(Playback {
            data: plan.data,
            next: 0,
            delay: self.config.step_delay(speed),
            deadline: Instant::now(),
        });
        self.play_next().await;
    }

    async fn play_next(&mut self) {
        let Some(playback) = self.playback.as_mut() else {
            return;
        };
        let Some(data) = playback.data.get(playback.next).cloned() else {
            self.playback = None;
            return;
        };
        playback.next += 1;
        if playback.next < playback.data.len() {
            playback.deadline = Instant::now() + playback.delay;
        } else {
            self.playback = None;
        }
        self.apply(Some(data)).await;
    }

    async fn apply(&mut self, data: Option<Arc<GridData>>) {
        if let Err(e) = self.target.set_data(data.clone()).await {
            warn!(error = %e, "Target rejected dataset");
        }
        self.current = data;
        self.applied += 1;
    }

    fn publish(&self) {
        let status = CoordinatorStatus {
            wanted_key: self.wanted.clone(),
            current_dtg: self
                .current
                .as_ref()
                .and_then(|d| d.reference_time())
                .map(|t| format_dtg(&t)),
            has_data: self.current.is_some(),
            playing: self.playback.is_some() || self.pending_plan.is_some(),
            applied: self.applied,
        };
        self.status.send_if_modified(|current| {
            if *current != status {
                *current = status;
                true
            } else {
                false
            }
        });
    }
}

async fn next_response(actor: &mut Option<DataActor>) -> Option<DataResponse> {
    match actor.as_mut() {
        Some(actor) => actor.next().await,
        None => std::future::pending().await,
    }
}
