//! Particle animator: particle population, field ownership and frame ticks.
//!
//! The animator is a synchronous state machine. Timers and the host's frame
//! callback live in [`crate::driver`]; here a frame is just [`tick`].
//!
//! States: `Stopped (-1) -> WaitingForField (0) -> Running (1)`. A field
//! arriving while waiting moves the animator to `Running`; losing the field
//! while running moves it back to `WaitingForField`.
//!
//! [`tick`]: ParticleAnimator::tick

use std::sync::Arc;

use flow_common::{CanvasBound, Extent, FlowError, FlowResult, GridData, Viewport};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use renderer::{build_field, create_field, ColorScale, Segment, Surface, VectorField};
use tracing::{debug, info, warn};

use crate::config::{AnimatorConfig, FrameSettings};
use crate::particle::Particle;
use crate::worker::{BuildOutcome, BuildRequest, FieldWorker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum AnimatorState {
    Stopped = -1,
    WaitingForField = 0,
    Running = 1,
}

impl AnimatorState {
    pub fn code(self) -> i8 {
        self as i8
    }
}

/// Canvas geometry the current field is built for.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Canvas {
    viewport: Viewport,
    extent: Extent,
    bound: CanvasBound,
}

pub struct ParticleAnimator {
    config: AnimatorConfig,
    colors: ColorScale,
    settings: FrameSettings,
    canvas: Option<Canvas>,
    data: Option<Arc<GridData>>,
    field: Option<VectorField>,
    particles: Vec<Particle>,
    /// Particle indices per colour, refilled by every `evolve`.
    buckets: Vec<Vec<usize>>,
    worker: Option<FieldWorker>,
    /// Bumped whenever the current field request changes.
    generation: u64,
    /// Generation of the build the worker owes us.
    pending: Option<u64>,
    state: AnimatorState,
    frames: u64,
    rng: StdRng,
}

impl std::fmt::Debug for ParticleAnimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleAnimator")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("pending", &self.pending)
            .field("particles", &self.particles.len())
            .field("has_field", &self.field.is_some())
            .field("worker", &self.worker.is_some())
            .finish()
    }
}

impl ParticleAnimator {
    pub fn new(config: AnimatorConfig) -> FlowResult<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Animator with reproducible particle seeding.
    pub fn with_seed(config: AnimatorConfig, seed: u64) -> FlowResult<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: AnimatorConfig, rng: StdRng) -> FlowResult<Self> {
        config.validate()?;
        let colors = config.color_scale()?;
        let worker = if config.use_worker {
            match FieldWorker::spawn() {
                Ok(worker) => Some(worker),
                Err(e) => {
                    warn!(error = %e, "Field worker unavailable, building fields inline");
                    None
                }
            }
        } else {
            None
        };
        let buckets = vec![Vec::new(); colors.len()];
        Ok(Self {
            settings: config.settings_for_zoom(0.0),
            config,
            colors,
            canvas: None,
            data: None,
            field: None,
            particles: Vec::new(),
            buckets,
            worker,
            generation: 0,
            pending: None,
            state: AnimatorState::Stopped,
            frames: 0,
            rng,
        })
    }

    /// Point the animator at a new canvas.
    ///
    /// Releases the current field and animation; does not start anything.
    pub fn set_canvas(&mut self, viewport: Viewport) {
        self.release();
        let canvas = Canvas {
            viewport,
            extent: viewport.extent(),
            bound: viewport.canvas_bound(),
        };
        self.settings = self.config.settings_for_zoom(viewport.zoom);
        self.particles.clear();
        debug!(
            width = viewport.width,
            height = viewport.height,
            zoom = viewport.zoom,
            "Canvas set"
        );
        self.canvas = Some(canvas);
    }

    /// Replace the dataset and rebuild the field.
    ///
    /// With a worker (and no bypass) the build is queued and the current
    /// field stays in place until the new one arrives. Otherwise the field is
    /// built inline. `None` drops the field.
    ///
    /// An inline validation failure drops the current field and is returned;
    /// the animator keeps running without a field.
    pub fn set_data(&mut self, data: Option<Arc<GridData>>, bypass_worker: bool) -> FlowResult<()> {
        self.generation += 1;
        self.pending = None;
        self.data = data;

        let Some(data) = self.data.clone() else {
            self.drop_field();
            return Ok(());
        };
        let Some(canvas) = self.canvas else {
            debug!("No canvas yet, field build deferred");
            return Ok(());
        };

        if !bypass_worker {
            if let Some(worker) = &self.worker {
                let request = BuildRequest {
                    generation: self.generation,
                    data: data.clone(),
                    keys: self.config.vector_keys.clone(),
                    velocity_scale: self.settings.velocity_scale,
                    canvas_bound: canvas.bound,
                    extent: canvas.extent,
                };
                match worker.submit(request) {
                    Ok(()) => {
                        self.pending = Some(self.generation);
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(error = %e, "Field worker lost, building inline");
                        self.worker = None;
                    }
                }
            }
        }

        match build_field(
            &data,
            &self.config.vector_keys,
            self.settings.velocity_scale,
            &canvas.bound,
            &canvas.extent,
        ) {
            Ok(field) => {
                self.install_field(field);
                Ok(())
            }
            Err(e) => {
                self.build_failed(&e);
                Err(e)
            }
        }
    }

    /// Host render trigger: adopt the canvas, rebuild from the current
    /// dataset and start.
    pub fn draw_layer(&mut self, viewport: Viewport, bypass_worker: bool) -> FlowResult<()> {
        self.set_canvas(viewport);
        let result = match self.data.clone() {
            Some(data) => self.set_data(Some(data), bypass_worker),
            None => Ok(()),
        };
        self.start();
        result
    }

    /// Apply every build the worker has finished. Returns true if a new
    /// field was installed.
    pub fn poll_worker(&mut self) -> bool {
        let mut installed = false;
        while let Some(outcome) = self.worker.as_mut().and_then(FieldWorker::try_next) {
            installed |= self.apply_build(outcome);
        }
        installed
    }

    /// Wait for the worker's next result. Never resolves without a worker.
    pub async fn wait_for_build(&mut self) -> Option<BuildOutcome> {
        match self.worker.as_mut() {
            Some(worker) => worker.next().await,
            None => std::future::pending().await,
        }
    }

    /// Install a worker result unless it answers a superseded request.
    pub fn apply_build(&mut self, outcome: BuildOutcome) -> bool {
        if self.pending != Some(outcome.generation) {
            metrics::counter!("flow_stale_results_dropped_total").increment(1);
            debug!(
                generation = outcome.generation,
                current = self.generation,
                "Dropping stale field build"
            );
            return false;
        }
        self.pending = None;
        match outcome.result {
            Ok(columns) => {
                debug!(
                    generation = outcome.generation,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "Field built by worker"
                );
                self.install_field(create_field(columns, outcome.canvas_bound));
                true
            }
            Err(e) => {
                self.build_failed(&e);
                false
            }
        }
    }

    /// The worker task exited. Fall back to inline builds and redo any build
    /// it still owed.
    pub fn worker_lost(&mut self) {
        if self.worker.take().is_none() {
            return;
        }
        warn!("Field worker exited, building fields inline");
        if self.pending.take().is_some() {
            let data = self.data.clone();
            if let Err(e) = self.set_data(data, true) {
                warn!(error = %e, "Inline rebuild failed");
            }
        }
    }

    /// `Stopped -> WaitingForField`, or straight to `Running` when a field
    /// is already present. No-op unless stopped.
    pub fn start(&mut self) {
        if self.state != AnimatorState::Stopped {
            return;
        }
        if self.field.is_some() {
            self.state = AnimatorState::Running;
            self.animate();
        } else {
            self.state = AnimatorState::WaitingForField;
        }
    }

    /// Stop ticking. Particles and field are kept.
    pub fn stop(&mut self) {
        self.state = AnimatorState::Stopped;
    }

    /// Stop and drop the field. Builds still in flight become stale.
    pub fn release(&mut self) {
        self.stop();
        self.generation += 1;
        self.pending = None;
        if let Some(field) = self.field.take() {
            field.release();
        }
    }

    /// Size the particle population for the canvas and seed it.
    ///
    /// An existing population of the right size is kept, so stop/start
    /// resumes where it left off.
    pub fn animate(&mut self) {
        let (Some(field), Some(canvas)) = (&self.field, &self.canvas) else {
            return;
        };
        let mut count =
            (canvas.bound.area() as f64 * self.settings.particle_multiplier).round();
        if self.config.mobile {
            count = (count * self.config.particle_reduction()).round();
        }
        let count = count.max(0.0) as usize;

        if self.particles.len() != count {
            let max_age = self.settings.particle_age;
            let rng = &mut self.rng;
            self.particles = (0..count)
                .map(|_| {
                    let age = rng.gen_range(0..max_age);
                    Particle::spawn(field, rng, age)
                })
                .collect();
            info!(particles = count, "Particles seeded");
        }
        metrics::gauge!("flow_particles").set(self.particles.len() as f64);
    }

    /// Advance every particle one step and sort the visible ones into
    /// colour buckets.
    pub fn evolve(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        let Some(field) = &self.field else {
            return;
        };
        let max_age = self.settings.particle_age;

        for (idx, particle) in self.particles.iter_mut().enumerate() {
            if particle.age > max_age {
                particle.respawn(field, &mut self.rng);
            }
            match field.sample(particle.x, particle.y) {
                // Left the field: expire on the next tick.
                None => particle.age = max_age,
                Some(wind) => {
                    let xt = particle.x + wind.u as f64;
                    let yt = particle.y + wind.v as f64;
                    if field.sample(xt, yt).is_some() {
                        particle.xt = xt;
                        particle.yt = yt;
                        self.buckets[self.colors.index_for(wind.magnitude)].push(idx);
                    } else {
                        // Crossing a gap: move without drawing.
                        particle.x = xt;
                        particle.y = yt;
                    }
                }
            }
            particle.age += 1;
        }
    }

    /// Fade the trails and stroke one path per colour bucket.
    pub fn draw(&mut self, surface: &mut Surface) {
        let Some(canvas) = &self.canvas else {
            return;
        };
        let trail_age = self.settings.trail_age;
        surface.fade(&canvas.bound, trail_age);

        for (bucket, color) in self.buckets.iter().zip(self.colors.colors()) {
            if bucket.is_empty() {
                continue;
            }
            let segments: Vec<Segment> = bucket
                .iter()
                .map(|&idx| {
                    let p = &mut self.particles[idx];
                    let segment = Segment {
                        from: [p.x as f32, p.y as f32],
                        to: [p.xt as f32, p.yt as f32],
                    };
                    p.advance();
                    segment
                })
                .collect();
            surface.stroke_segments(*color, self.config.line_width, trail_age, segments);
        }
    }

    /// One frame: evolve then draw. Returns false when not running.
    pub fn tick(&mut self, surface: &mut Surface) -> bool {
        if self.state != AnimatorState::Running {
            return false;
        }
        self.evolve();
        self.draw(surface);
        self.frames += 1;
        metrics::counter!("flow_frames_total").increment(1);
        true
    }

    fn install_field(&mut self, field: VectorField) {
        if let Some(old) = self.field.replace(field) {
            old.release();
        }
        metrics::counter!("flow_field_builds_total").increment(1);
        if self.state == AnimatorState::WaitingForField {
            self.state = AnimatorState::Running;
        }
        if self.state == AnimatorState::Running {
            self.animate();
        }
    }

    fn drop_field(&mut self) {
        if let Some(field) = self.field.take() {
            field.release();
        }
        if self.state == AnimatorState::Running {
            self.state = AnimatorState::WaitingForField;
        }
    }

    fn build_failed(&mut self, error: &FlowError) {
        metrics::counter!("flow_field_build_failures_total").increment(1);
        warn!(error = %error, "Field build failed, no field");
        self.drop_field();
    }

    pub fn state(&self) -> AnimatorState {
        self.state
    }

    pub fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    pub fn settings(&self) -> &FrameSettings {
        &self.settings
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.canvas.map(|c| c.viewport)
    }

    pub fn canvas_bound(&self) -> Option<CanvasBound> {
        self.canvas.map(|c| c.bound)
    }

    pub fn data(&self) -> Option<&Arc<GridData>> {
        self.data.as_ref()
    }

    pub fn field(&self) -> Option<&VectorField> {
        self.field.as_ref()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Particles queued for drawing by the last `evolve`.
    pub fn bucket_occupancy(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    pub fn is_build_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn frame_interval(&self) -> std::time::Duration {
        self.config.frame_interval()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_common::RegularAxis;
    use test_utils::{uniform_coverage, viewports};

    fn inline_config() -> AnimatorConfig {
        AnimatorConfig {
            use_worker: false,
            ..Default::default()
        }
    }

    fn covering_data(u: f32, v: f32) -> Arc<GridData> {
        Arc::new(uniform_coverage(
            RegularAxis::new(-10.0, 30.0, 9),
            RegularAxis::new(60.0, 30.0, 7),
            u,
            v,
        ))
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(AnimatorState::Stopped.code(), -1);
        assert_eq!(AnimatorState::WaitingForField.code(), 0);
        assert_eq!(AnimatorState::Running.code(), 1);
    }

    #[test]
    fn test_start_waits_for_field() {
        let mut animator = ParticleAnimator::with_seed(inline_config(), 1).unwrap();
        animator.set_canvas(viewports::small());
        animator.start();
        assert_eq!(animator.state(), AnimatorState::WaitingForField);

        animator.set_data(Some(covering_data(1.0, 0.0)), false).unwrap();
        assert_eq!(animator.state(), AnimatorState::Running);
        // 64 * 48 / 200 = 15.36
        assert_eq!(animator.particles().len(), 15);
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut animator = ParticleAnimator::with_seed(inline_config(), 2).unwrap();
        animator.set_canvas(viewports::small());
        animator.set_data(Some(covering_data(1.0, 0.0)), false).unwrap();
        animator.start();
        let before = animator.particles().to_vec();
        animator.start();
        assert_eq!(animator.state(), AnimatorState::Running);
        assert_eq!(animator.particles(), &before[..]);
    }

    #[test]
    fn test_mobile_scales_particle_count() {
        let config = AnimatorConfig {
            use_worker: false,
            mobile: true,
            device_pixel_ratio: 8.0,
            ..Default::default()
        };
        let mut animator = ParticleAnimator::with_seed(config, 3).unwrap();
        animator.set_canvas(viewports::small());
        animator.set_data(Some(covering_data(1.0, 0.0)), false).unwrap();
        animator.start();
        assert_eq!(animator.particles().len(), 30);
    }

    #[test]
    fn test_initial_ages_are_staggered() {
        let config = AnimatorConfig {
            use_worker: false,
            particle_multiplier: 0.1,
            ..Default::default()
        };
        let mut animator = ParticleAnimator::with_seed(config, 4).unwrap();
        animator.set_canvas(viewports::small());
        animator.set_data(Some(covering_data(1.0, 0.0)), false).unwrap();
        animator.start();
        let ages: Vec<u32> = animator.particles().iter().map(|p| p.age).collect();
        assert!(ages.iter().all(|&a| a < 120));
        assert!(ages.iter().any(|&a| a != ages[0]));
    }

    #[test]
    fn test_set_data_none_waits_again() {
        let mut animator = ParticleAnimator::with_seed(inline_config(), 5).unwrap();
        animator.set_canvas(viewports::small());
        animator.set_data(Some(covering_data(1.0, 0.0)), false).unwrap();
        animator.start();
        animator.set_data(None, false).unwrap();
        assert!(animator.field().is_none());
        assert_eq!(animator.state(), AnimatorState::WaitingForField);
    }

    #[test]
    fn test_validation_error_drops_field() {
        let mut animator = ParticleAnimator::with_seed(inline_config(), 6).unwrap();
        animator.set_canvas(viewports::small());
        animator.set_data(Some(covering_data(1.0, 0.0)), false).unwrap();
        animator.start();

        let mut bad = (*covering_data(1.0, 0.0)).clone();
        if let GridData::Coverage(c) = &mut bad {
            c.ranges.remove("v");
        }
        let err = animator.set_data(Some(Arc::new(bad)), false).unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
        assert!(animator.field().is_none());
        assert_eq!(animator.state(), AnimatorState::WaitingForField);
    }

    #[test]
    fn test_stale_outcome_is_dropped() {
        let mut animator = ParticleAnimator::with_seed(inline_config(), 7).unwrap();
        animator.set_canvas(viewports::small());
        let outcome = BuildOutcome {
            generation: 99,
            canvas_bound: viewports::small().canvas_bound(),
            result: Ok(Default::default()),
            elapsed: std::time::Duration::ZERO,
        };
        assert!(!animator.apply_build(outcome));
        assert!(animator.field().is_none());
    }

    #[test]
    fn test_tick_requires_running() {
        let mut animator = ParticleAnimator::with_seed(inline_config(), 8).unwrap();
        let mut surface = Surface::new(64, 48).unwrap();
        assert!(!animator.tick(&mut surface));
        animator.set_canvas(viewports::small());
        animator.set_data(Some(covering_data(5.0, 5.0)), false).unwrap();
        animator.start();
        assert!(animator.tick(&mut surface));
        assert_eq!(animator.frames(), 1);
    }
}
