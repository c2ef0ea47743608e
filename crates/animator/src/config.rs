//! Animator configuration.
//!
//! Every tunable of the particle animation with its default. Loaded from
//! YAML (or JSON) and validated once when the animator is constructed.

use std::collections::BTreeMap;
use std::time::Duration;

use flow_common::{FlowError, FlowResult, VectorKeys};
use renderer::colorscale::DEFAULT_COLORS;
use renderer::{Color, ColorScale};
use serde::{Deserialize, Serialize};

/// Frame rate at and above which the loop runs at the display refresh rate.
pub const DISPLAY_FRAME_RATE: u32 = 60;

/// Particle count factor on mobile when the pixel ratio is unusable.
const FALLBACK_PARTICLE_REDUCTION: f64 = 1.6;

/// Per-zoom overrides. Unset fields fall back to the base configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoomTier {
    #[serde(default)]
    pub velocity_scale: Option<f64>,
    #[serde(default)]
    pub trail_age: Option<f32>,
    #[serde(default)]
    pub particle_age: Option<u32>,
    #[serde(default)]
    pub particle_multiplier: Option<f64>,
}

/// Settings in effect for one zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSettings {
    /// Velocity scale including the pixel-ratio adjustment.
    pub velocity_scale: f64,
    pub trail_age: f32,
    pub particle_age: u32,
    pub particle_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimatorConfig {
    /// Wind speed (m/s) mapped to the first colour.
    #[serde(default)]
    pub min_velocity: f64,

    /// Wind speed (m/s) mapped to the last colour.
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f64,

    /// Pixels per frame per m/s, before area and pixel-ratio scaling.
    #[serde(default = "default_velocity_scale")]
    pub velocity_scale: f64,

    /// Frames a particle lives before it respawns.
    #[serde(default = "default_particle_age")]
    pub particle_age: u32,

    #[serde(default = "default_line_width")]
    pub line_width: f32,

    /// Particles per canvas pixel.
    #[serde(default = "default_particle_multiplier")]
    pub particle_multiplier: f64,

    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Fraction of trail opacity kept each frame.
    #[serde(default = "default_trail_age")]
    pub trail_age: f32,

    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f64,

    /// Constrained device: particle count is scaled by the density factor.
    #[serde(default)]
    pub mobile: bool,

    /// Build fields on the background worker instead of inline.
    #[serde(default = "default_use_worker")]
    pub use_worker: bool,

    #[serde(default)]
    pub vector_keys: VectorKeys,

    #[serde(default = "default_colors")]
    pub color_scale: Vec<Color>,

    /// Overrides keyed by the lowest zoom level they apply to.
    #[serde(default)]
    pub zoom_tiers: BTreeMap<u32, ZoomTier>,
}

fn default_max_velocity() -> f64 {
    10.0
}

fn default_velocity_scale() -> f64 {
    0.015
}

fn default_particle_age() -> u32 {
    120
}

fn default_line_width() -> f32 {
    1.0
}

fn default_particle_multiplier() -> f64 {
    1.0 / 200.0
}

fn default_frame_rate() -> u32 {
    16
}

fn default_trail_age() -> f32 {
    0.9
}

fn default_device_pixel_ratio() -> f64 {
    1.0
}

fn default_use_worker() -> bool {
    true
}

fn default_colors() -> Vec<Color> {
    DEFAULT_COLORS.to_vec()
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            min_velocity: 0.0,
            max_velocity: default_max_velocity(),
            velocity_scale: default_velocity_scale(),
            particle_age: default_particle_age(),
            line_width: default_line_width(),
            particle_multiplier: default_particle_multiplier(),
            frame_rate: default_frame_rate(),
            trail_age: default_trail_age(),
            device_pixel_ratio: default_device_pixel_ratio(),
            mobile: false,
            use_worker: default_use_worker(),
            vector_keys: VectorKeys::default(),
            color_scale: default_colors(),
            zoom_tiers: BTreeMap::new(),
        }
    }
}

fn check_positive(name: &str, value: f64) -> FlowResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FlowError::config(format!("{} must be positive, got {}", name, value)))
    }
}

fn check_trail_age(value: f32) -> FlowResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(FlowError::config(format!("trail_age must be within [0, 1], got {}", value)))
    }
}

impl AnimatorConfig {
    /// Parse a YAML (or JSON) document and validate it.
    pub fn from_yaml_str(s: &str) -> FlowResult<Self> {
        let config: Self = serde_yaml::from_str(s)
            .map_err(|e| FlowError::config(format!("animator config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FlowResult<()> {
        self.color_scale()?;
        check_positive("velocity_scale", self.velocity_scale)?;
        check_positive("line_width", self.line_width as f64)?;
        if !self.particle_multiplier.is_finite() || self.particle_multiplier < 0.0 {
            return Err(FlowError::config(format!(
                "particle_multiplier must be non-negative, got {}",
                self.particle_multiplier
            )));
        }
        if self.particle_age == 0 {
            return Err(FlowError::config("particle_age must be at least one frame"));
        }
        if self.frame_rate == 0 {
            return Err(FlowError::config("frame_rate must be at least 1"));
        }
        check_trail_age(self.trail_age)?;

        for (zoom, tier) in &self.zoom_tiers {
            let ctx = |e: FlowError| FlowError::config(format!("zoom tier {}: {}", zoom, e));
            if let Some(scale) = tier.velocity_scale {
                check_positive("velocity_scale", scale).map_err(ctx)?;
            }
            if let Some(trail) = tier.trail_age {
                check_trail_age(trail).map_err(ctx)?;
            }
            if tier.particle_age == Some(0) {
                return Err(ctx(FlowError::config("particle_age must be at least one frame")));
            }
            if let Some(m) = tier.particle_multiplier {
                if !m.is_finite() || m < 0.0 {
                    return Err(ctx(FlowError::config("particle_multiplier must be non-negative")));
                }
            }
        }
        Ok(())
    }

    pub fn color_scale(&self) -> FlowResult<ColorScale> {
        ColorScale::new(self.color_scale.clone(), self.min_velocity, self.max_velocity)
    }

    /// Cube root of the device pixel ratio, if the ratio is usable.
    fn pixel_ratio_root(&self) -> Option<f64> {
        let dpr = self.device_pixel_ratio;
        (dpr.is_finite() && dpr > 0.0).then(|| dpr.cbrt())
    }

    /// Factor applied to the particle count on mobile devices.
    pub fn particle_reduction(&self) -> f64 {
        self.pixel_ratio_root().unwrap_or(FALLBACK_PARTICLE_REDUCTION)
    }

    /// Tier whose key is the greatest one not above `zoom`.
    pub fn tier_for(&self, zoom: f64) -> Option<&ZoomTier> {
        if !zoom.is_finite() || zoom < 0.0 {
            return None;
        }
        let level = zoom.floor() as u32;
        self.zoom_tiers.range(..=level).next_back().map(|(_, tier)| tier)
    }

    /// Settings in effect at `zoom`, tier overrides applied.
    pub fn settings_for_zoom(&self, zoom: f64) -> FrameSettings {
        let tier = self.tier_for(zoom);
        let base_scale = tier
            .and_then(|t| t.velocity_scale)
            .unwrap_or(self.velocity_scale);
        FrameSettings {
            velocity_scale: base_scale * self.pixel_ratio_root().unwrap_or(1.0),
            trail_age: tier.and_then(|t| t.trail_age).unwrap_or(self.trail_age),
            particle_age: tier.and_then(|t| t.particle_age).unwrap_or(self.particle_age),
            particle_multiplier: tier
                .and_then(|t| t.particle_multiplier)
                .unwrap_or(self.particle_multiplier),
        }
    }

    /// Delay between animation ticks.
    pub fn frame_interval(&self) -> Duration {
        let rate = self.frame_rate.clamp(1, DISPLAY_FRAME_RATE);
        Duration::from_secs_f64(1.0 / rate as f64)
    }
}
