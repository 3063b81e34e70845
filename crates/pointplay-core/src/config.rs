// crates/pointplay-core/src/config.rs
//
// Tunables for the player. Serializable so a front end can keep them in a
// JSON file; every field has a default so partial files are fine.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// FrameSampler cadence while playing.
    pub sample_hz:      f64,
    /// Captured frames are downscaled to this width before inference.
    pub target_width:   u32,
    /// Gamma applied when turning frame pixels into point colors.
    pub color_gamma:    f32,
    /// Depth range of the point cloud along z, centred on the origin.
    pub z_scale:        f32,
    /// Take an immediate off-cycle sample after a seek.
    pub sample_on_seek: bool,
    /// Publish colors before the first positions arrive.
    pub early_colors:   bool,
    /// How often a clock-driven transport reports `timeUpdate`.
    pub time_update_hz: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_hz:      24.0,
            target_width:   320,
            color_gamma:    1.8,
            z_scale:        3.0,
            sample_on_seek: true,
            early_colors:   false,
            time_update_hz: 4.0,
        }
    }
}

impl PlayerConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, PlayerError> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| PlayerError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: &Path) -> Result<Self, PlayerError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PlayerError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), PlayerError> {
        check_rate("sample_hz", self.sample_hz)?;
        check_rate("time_update_hz", self.time_update_hz)?;
        if self.target_width == 0 {
            return Err(PlayerError::InvalidConfig("target_width must be > 0".into()));
        }
        if !(self.color_gamma.is_finite() && self.color_gamma > 0.0) {
            return Err(PlayerError::InvalidConfig(format!("color_gamma must be > 0, got {}", self.color_gamma)));
        }
        if !(self.z_scale.is_finite() && self.z_scale > 0.0) {
            return Err(PlayerError::InvalidConfig(format!("z_scale must be > 0, got {}", self.z_scale)));
        }
        Ok(())
    }

    /// Sampler period derived from `sample_hz`. Out-of-range rates are
    /// clamped, so an unvalidated config still yields a usable period.
    pub fn sample_period(&self) -> Duration {
        period_of(self.sample_hz, Self::default().sample_hz)
    }

    pub fn time_update_period(&self) -> Duration {
        period_of(self.time_update_hz, Self::default().time_update_hz)
    }
}

/// Accepted range for every `*_hz` field.
pub const MIN_RATE_HZ: f64 = 0.001;
pub const MAX_RATE_HZ: f64 = 1000.0;

fn check_rate(field: &str, hz: f64) -> Result<(), PlayerError> {
    if hz.is_finite() && (MIN_RATE_HZ..=MAX_RATE_HZ).contains(&hz) {
        Ok(())
    } else {
        Err(PlayerError::InvalidConfig(format!(
            "{field} must be within {MIN_RATE_HZ}..={MAX_RATE_HZ} Hz, got {hz}",
        )))
    }
}

fn period_of(hz: f64, fallback: f64) -> Duration {
    let hz = if hz.is_finite() && hz > 0.0 { hz } else { fallback };
    Duration::from_secs_f64(1.0 / hz.clamp(MIN_RATE_HZ, MAX_RATE_HZ))
}
