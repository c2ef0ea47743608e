//! Viewer configuration.
//!
//! One YAML file holding the animator tunables, the transition settings,
//! where datasets come from and the viewport to render.

use std::path::{Path, PathBuf};

use animator::AnimatorConfig;
use anyhow::{Context, Result};
use flow_common::Viewport;
use serde::Deserialize;
use tracing::info;
use transition::{SourceConfig, TransitionConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub animator: AnimatorConfig,
    #[serde(default)]
    pub transition: TransitionConfig,
    #[serde(default = "default_source")]
    pub source: SourceConfig,
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,
}

fn default_source() -> SourceConfig {
    SourceConfig::File {
        dir: PathBuf::from("data"),
    }
}

/// Western Europe at zoom 4.
fn default_viewport() -> Viewport {
    Viewport::new(800, 600, [-10.0, 35.0], [30.0, 60.0], 4.0)
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            animator: AnimatorConfig::default(),
            transition: TransitionConfig::default(),
            source: default_source(),
            viewport: default_viewport(),
        }
    }
}

impl ViewerConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(s).context("Failed to parse viewer config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file given, using defaults");
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_yaml_str(&text)?;
        info!(path = %path.display(), "Loaded viewer config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.animator.validate().context("Invalid animator config")?;
        self.transition
            .validate()
            .context("Invalid transition config")?;
        if self.viewport.width == 0 || self.viewport.height == 0 {
            anyhow::bail!(
                "viewport must have a non-zero size, got {}x{}",
                self.viewport.width,
                self.viewport.height
            );
        }
        Ok(())
    }
}
