use std::fmt;

use layers::{ClusterConfig, FlatViewport, Symbology};
use serde::{Deserialize, Serialize};

use crate::state::ViewMode;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Json(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json(e) => write!(f, "viewer config is not valid JSON: {e}"),
            ConfigError::Invalid(e) => write!(f, "invalid viewer config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Session settings. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub default_view: ViewMode,
    pub viewport: FlatViewport,
    pub clustering: ClusterConfig,
    pub symbology: Symbology,
}

impl ViewerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.clustering;
        if !(c.min_zoom.is_finite() && c.max_zoom.is_finite()) || c.max_zoom < c.min_zoom {
            return Err(ConfigError::Invalid(format!(
                "zoom range [{}, {}] is empty",
                c.min_zoom, c.max_zoom
            )));
        }
        if !(c.zoom_step.is_finite() && c.zoom_step > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "zoom_step must be positive, got {}",
                c.zoom_step
            )));
        }
        if !(c.radius_px >= 0.0 && c.min_radius_px >= 0.0) {
            return Err(ConfigError::Invalid("cluster radii must be non-negative".into()));
        }
        if !(self.viewport.width_px > 0.0 && self.viewport.height_px > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "viewport must have positive size, got {}x{}",
                self.viewport.width_px, self.viewport.height_px
            )));
        }
        Ok(())
    }
}
