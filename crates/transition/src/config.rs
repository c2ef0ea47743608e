//! Transition and data source configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use flow_common::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};

use crate::source::{FileSource, GridSource, HttpSource};

/// How transitions between datasets are interpolated and played back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// Hours of reference-time difference per interpolation step.
    #[serde(default = "default_granularity_hours")]
    pub granularity_hours: f64,

    #[serde(default = "default_min_steps")]
    pub min_steps: usize,

    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Steps used when either dataset has no usable reference time.
    #[serde(default = "default_steps")]
    pub default_steps: usize,

    /// Milliseconds per unit of plan speed.
    #[serde(default = "default_playback_scalar_ms")]
    pub playback_scalar_ms: u64,

    /// Fetch and interpolate on the background actor.
    #[serde(default = "default_use_background")]
    pub use_background: bool,
}

fn default_granularity_hours() -> f64 {
    3.0
}

fn default_min_steps() -> usize {
    2
}

fn default_max_steps() -> usize {
    24
}

fn default_steps() -> usize {
    4
}

fn default_playback_scalar_ms() -> u64 {
    2000
}

fn default_use_background() -> bool {
    true
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            granularity_hours: default_granularity_hours(),
            min_steps: default_min_steps(),
            max_steps: default_max_steps(),
            default_steps: default_steps(),
            playback_scalar_ms: default_playback_scalar_ms(),
            use_background: default_use_background(),
        }
    }
}

impl TransitionConfig {
    pub fn validate(&self) -> FlowResult<()> {
        if !(self.granularity_hours.is_finite() && self.granularity_hours > 0.0) {
            return Err(FlowError::config(format!(
                "granularity_hours must be positive, got {}",
                self.granularity_hours
            )));
        }
        if self.min_steps < 1 || self.min_steps > self.max_steps {
            return Err(FlowError::config(format!(
                "step range {}..={} is empty",
                self.min_steps, self.max_steps
            )));
        }
        if self.default_steps < 1 {
            return Err(FlowError::config("default_steps must be at least 1"));
        }
        if self.playback_scalar_ms == 0 {
            return Err(FlowError::config("playback_scalar_ms must be positive"));
        }
        if self.step_delay(self.granularity_hours / self.min_steps as f64) == Duration::MAX {
            return Err(FlowError::config(format!(
                "playback_scalar_ms {} with granularity_hours {} overflows the step delay",
                self.playback_scalar_ms, self.granularity_hours
            )));
        }
        Ok(())
    }

    /// Real delay for a plan step of the given speed.
    ///
    /// Negative or NaN speeds give no delay; delays too long to represent
    /// saturate at `Duration::MAX`.
    pub fn step_delay(&self, speed: f64) -> Duration {
        let secs = speed * self.playback_scalar_ms as f64 / 1000.0;
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Where datasets come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    /// `<dir>/<key>.json`
    File { dir: PathBuf },
    /// URL with a `{key}` placeholder.
    Http {
        url_template: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        #[serde(default = "default_max_bytes")]
        max_bytes: u64,
    },
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_bytes() -> u64 {
    256 * 1024 * 1024
}

impl SourceConfig {
    pub fn build(&self) -> FlowResult<Arc<dyn GridSource>> {
        match self {
            SourceConfig::File { dir } => Ok(Arc::new(FileSource::new(dir.clone()))),
            SourceConfig::Http {
                url_template,
                timeout_secs,
                max_bytes,
            } => Ok(Arc::new(HttpSource::new(
                url_template.clone(),
                Duration::from_secs(*timeout_secs),
                *max_bytes,
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = TransitionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.step_delay(0.5), Duration::from_millis(1000));
    }

    #[test]
    fn test_rejects_empty_step_range() {
        let config = TransitionConfig {
            min_steps: 5,
            max_steps: 3,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FlowError::Config(_))));
    }

    #[test]
    fn test_rejects_unusable_playback_scalar() {
        let zero = TransitionConfig {
            playback_scalar_ms: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(FlowError::Config(_))));

        let overflowing = TransitionConfig {
            playback_scalar_ms: u64::MAX,
            granularity_hours: 1e300,
            ..Default::default()
        };
        assert!(matches!(overflowing.validate(), Err(FlowError::Config(_))));
    }

    #[test]
    fn test_step_delay_never_panics() {
        let config = TransitionConfig {
            playback_scalar_ms: u64::MAX,
            ..Default::default()
        };
        assert_eq!(config.step_delay(f64::MAX), Duration::MAX);
        assert_eq!(config.step_delay(f64::INFINITY), Duration::MAX);
        assert_eq!(config.step_delay(f64::NAN), Duration::ZERO);
        assert_eq!(config.step_delay(-1.0), Duration::ZERO);
    }

    #[test]
    fn test_source_config_yaml() {
        let file: SourceConfig = serde_yaml::from_str("type: file\ndir: /data/wind").unwrap();
        assert_eq!(
            file,
            SourceConfig::File {
                dir: PathBuf::from("/data/wind")
            }
        );

        let http: SourceConfig =
            serde_yaml::from_str("type: http\nurl_template: http://host/wind/{key}.json").unwrap();
        let SourceConfig::Http { timeout_secs, .. } = http else {
            panic!("expected http source");
        };
        assert_eq!(timeout_secs, 30);
    }
}
