use std::time::Duration;

use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Tunable engine constants.
///
/// Every field has a default, so a host can override any subset from JSON.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period after a click before it is resolved
    pub debounce_ms: u64,
    /// Radius of the nearby-place search around a clicked coordinate
    pub nearby_radius_m: f64,
    /// Upper bound for any single network lookup
    pub lookup_timeout_ms: u64,
    /// Screen padding used when fitting the viewport to a result set
    pub fit_padding_px: f64,
    pub poll_interval_ms: u64,
    /// Zoom assumed until the surface reports its first viewport
    pub initial_zoom: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 350,
            nearby_radius_m: 40.0,
            lookup_timeout_ms: 5_000,
            fit_padding_px: 48.0,
            poll_interval_ms: 5_000,
            initial_zoom: 16,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(EngineError::Config("debounce_ms must be positive".into()));
        }
        if !self.nearby_radius_m.is_finite() || self.nearby_radius_m <= 0.0 {
            return Err(EngineError::Config(format!(
                "nearby_radius_m must be a positive distance, got {}",
                self.nearby_radius_m
            )));
        }
        if self.lookup_timeout_ms == 0 || self.poll_interval_ms == 0 {
            return Err(EngineError::Config(
                "lookup_timeout_ms and poll_interval_ms must be positive".into(),
            ));
        }
        if !self.fit_padding_px.is_finite() || self.fit_padding_px < 0.0 {
            return Err(EngineError::Config("fit_padding_px must be non-negative".into()));
        }
        Ok(())
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
