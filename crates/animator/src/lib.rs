//! Particle animation for wind flow fields.
//!
//! - [`ParticleAnimator`]: synchronous core holding the particles and the
//!   current field, advanced one frame per [`ParticleAnimator::tick`]
//! - [`FieldWorker`]: background field builder with single-slot coalescing
//! - [`AnimatorHandle`]: async driver pacing frames and applying builds
//! - [`AnimatorConfig`]: tunables, zoom tiers and their defaults

pub mod animator;
pub mod config;
pub mod driver;
pub mod particle;
pub mod worker;

pub use animator::{AnimatorState, ParticleAnimator};
pub use config::{AnimatorConfig, FrameSettings, ZoomTier};
pub use driver::{AnimatorHandle, AnimatorStatus};
pub use particle::Particle;
pub use worker::{BuildOutcome, BuildRequest, FieldWorker};
