//! Async driver: runs a [`ParticleAnimator`] on its own task.
//!
//! The task owns the animator and the drawable surface. Commands arrive over
//! a channel, worker results are applied as they land, and frames are paced
//! by an interval that only ticks while the animator is running. Stopping
//! disables the interval, so no frame fires after `stop` or `release`.

use std::sync::Arc;

use flow_common::{FlowError, FlowResult, GridData, Viewport};
use renderer::Surface;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::animator::{AnimatorState, ParticleAnimator};

/// Snapshot of the animator's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatorStatus {
    pub state: AnimatorState,
    pub frames: u64,
    pub particles: usize,
    pub bucket_occupancy: usize,
    pub has_field: bool,
    pub has_data: bool,
    pub build_pending: bool,
    pub viewport: Option<Viewport>,
}

impl AnimatorStatus {
    fn of(animator: &ParticleAnimator) -> Self {
        Self {
            state: animator.state(),
            frames: animator.frames(),
            particles: animator.particles().len(),
            bucket_occupancy: animator.bucket_occupancy(),
            has_field: animator.field().is_some(),
            has_data: animator.data().is_some(),
            build_pending: animator.is_build_pending(),
            viewport: animator.viewport(),
        }
    }
}

enum Command {
    DrawLayer {
        viewport: Viewport,
        bypass_worker: bool,
    },
    SetData {
        data: Option<Arc<GridData>>,
        bypass_worker: bool,
    },
    Start,
    Stop,
    Release,
    Snapshot(oneshot::Sender<FlowResult<Vec<u8>>>),
    Status(oneshot::Sender<AnimatorStatus>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle to a running animator task.
#[derive(Debug, Clone)]
pub struct AnimatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<AnimatorState>,
}

impl AnimatorHandle {
    /// Move `animator` onto a new task on the current runtime.
    pub fn spawn(animator: ParticleAnimator) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(animator.state());
        tokio::spawn(run(animator, command_rx, state_tx));
        Self {
            commands: command_tx,
            state: state_rx,
        }
    }

    fn send(&self, command: Command) -> FlowResult<()> {
        self.commands
            .send(command)
            .map_err(|_| FlowError::worker_unavailable("animator task has stopped"))
    }

    /// Host render trigger: new viewport, rebuild from current data, start.
    pub fn draw_layer(&self, viewport: Viewport, bypass_worker: bool) -> FlowResult<()> {
        self.send(Command::DrawLayer {
            viewport,
            bypass_worker,
        })
    }

    pub fn set_data(&self, data: Option<Arc<GridData>>) -> FlowResult<()> {
        self.set_data_with(data, false)
    }

    pub fn set_data_with(&self, data: Option<Arc<GridData>>, bypass_worker: bool) -> FlowResult<()> {
        self.send(Command::SetData {
            data,
            bypass_worker,
        })
    }

    pub fn start(&self) -> FlowResult<()> {
        self.send(Command::Start)
    }

    pub fn stop(&self) -> FlowResult<()> {
        self.send(Command::Stop)
    }

    pub fn release(&self) -> FlowResult<()> {
        self.send(Command::Release)
    }

    /// Current surface as PNG.
    pub async fn snapshot(&self) -> FlowResult<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await
            .map_err(|_| FlowError::worker_unavailable("animator task dropped the snapshot"))?
    }

    pub async fn status(&self) -> FlowResult<AnimatorStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Status(tx))?;
        rx.await
            .map_err(|_| FlowError::worker_unavailable("animator task dropped the status"))
    }

    /// Last state published by the task.
    pub fn state(&self) -> AnimatorState {
        *self.state.borrow()
    }

    /// Resolve once the animator reaches `state`.
    pub async fn wait_for_state(&self, state: AnimatorState) -> FlowResult<()> {
        let mut rx = self.state.clone();
        rx.wait_for(|s| *s == state)
            .await
            .map(|_| ())
            .map_err(|_| FlowError::worker_unavailable("animator task has stopped"))
    }

    /// Release the animator and end its task.
    pub async fn shutdown(&self) -> FlowResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(tx))?;
        rx.await
            .map_err(|_| FlowError::worker_unavailable("animator task ended early"))
    }
}

fn resize_surface(surface: &mut Option<Surface>, viewport: &Viewport) {
    let same_size = surface
        .as_ref()
        .is_some_and(|s| s.width() == viewport.width && s.height() == viewport.height);
    if same_size {
        return;
    }
    *surface = match Surface::new(viewport.width, viewport.height) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(error = %e, "Cannot allocate drawable surface");
            None
        }
    };
}

async fn run(
    mut animator: ParticleAnimator,
    mut commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<AnimatorState>,
) {
    let mut surface: Option<Surface> = None;
    let mut ticker = interval(animator.frame_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        frame_ms = animator.frame_interval().as_millis() as u64,
        worker = animator.has_worker(),
        "Animator task started"
    );

    loop {
        let was_running = animator.state() == AnimatorState::Running;

        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                match command {
                    Command::DrawLayer { viewport, bypass_worker } => {
                        resize_surface(&mut surface, &viewport);
                        if let Some(s) = surface.as_mut() {
                            s.clear();
                        }
                        if let Err(e) = animator.draw_layer(viewport, bypass_worker) {
                            warn!(error = %e, "Field build failed on redraw");
                        }
                    }
                    Command::SetData { data, bypass_worker } => {
                        if let Err(e) = animator.set_data(data, bypass_worker) {
                            warn!(error = %e, "Dataset rejected");
                        }
                    }
                    Command::Start => animator.start(),
                    Command::Stop => animator.stop(),
                    Command::Release => animator.release(),
                    Command::Snapshot(reply) => {
                        let png = match surface.as_ref() {
                            Some(s) => s.to_png(),
                            None => Err(FlowError::render("no drawable surface")),
                        };
                        let _ = reply.send(png);
                    }
                    Command::Status(reply) => {
                        let _ = reply.send(AnimatorStatus::of(&animator));
                    }
                    Command::Shutdown(reply) => {
                        animator.release();
                        let _ = state_tx.send(animator.state());
                        let _ = reply.send(());
                        break;
                    }
                }
            }
            outcome = animator.wait_for_build() => {
                match outcome {
                    Some(outcome) => {
                        animator.apply_build(outcome);
                    }
                    None => animator.worker_lost(),
                }
            }
            _ = ticker.tick(), if was_running => {
                match surface.as_mut() {
                    Some(s) => {
                        animator.tick(s);
                    }
                    None => error!("Running without a drawable surface"),
                }
            }
        }

        let now_running = animator.state() == AnimatorState::Running;
        if now_running && !was_running {
            // First frame one interval after the field arrives.
            ticker.reset();
        }
        state_tx.send_if_modified(|current| {
            let next = animator.state();
            if *current != next {
                *current = next;
                true
            } else {
                false
            }
        });
    }
    debug!("Animator task stopped");
}
