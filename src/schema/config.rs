//! Configuration types for the simulation engine.

use serde::{Deserialize, Serialize};

fn default_size() -> usize {
    1024
}

fn default_search_radius() -> usize {
    64
}

fn default_ap_duration() -> u32 {
    8
}

fn default_rest_duration() -> u32 {
    4
}

fn default_ap_threshold() -> f32 {
    16.0
}

fn default_update_stripes() -> usize {
    8
}

fn default_frame_time_ms() -> u64 {
    16
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Grid width in cells.
    #[serde(default = "default_size")]
    pub width: usize,
    /// Grid height in cells.
    #[serde(default = "default_size")]
    pub height: usize,
    /// Side length of the square coupling kernel. Must be even and no larger
    /// than either grid dimension.
    #[serde(default = "default_search_radius")]
    pub search_radius: usize,
    /// Action-potential length in ticks.
    #[serde(default = "default_ap_duration")]
    pub ap_duration: u32,
    /// Refractory length in ticks.
    #[serde(default = "default_rest_duration")]
    pub rest_duration: u32,
    /// Weighted neighbour count a quiescent tissue cell must strictly exceed
    /// to fire.
    #[serde(default = "default_ap_threshold")]
    pub ap_threshold: f32,
    /// Number of row-major stripes the cell update is split into.
    #[serde(default = "default_update_stripes")]
    pub update_stripes: usize,
    /// Minimum wall time per tick in milliseconds; the simulation thread
    /// sleeps out the remainder of fast ticks.
    #[serde(default = "default_frame_time_ms")]
    pub frame_time_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: default_size(),
            height: default_size(),
            search_radius: default_search_radius(),
            ap_duration: default_ap_duration(),
            rest_duration: default_rest_duration(),
            ap_threshold: default_ap_threshold(),
            update_stripes: default_update_stripes(),
            frame_time_ms: default_frame_time_ms(),
        }
    }
}

impl SimConfig {
    /// Total number of lattice sites.
    #[inline]
    pub fn grid_size(&self) -> usize {
        self.width * self.height
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.search_radius == 0 || self.search_radius % 2 != 0 {
            return Err(ConfigError::InvalidSearchRadius(self.search_radius));
        }
        if self.search_radius > self.width.min(self.height) {
            return Err(ConfigError::SearchRadiusExceedsGrid {
                radius: self.search_radius,
                width: self.width,
                height: self.height,
            });
        }
        if self.ap_duration == 0 {
            return Err(ConfigError::InvalidApDuration);
        }
        if self.rest_duration == 0 {
            return Err(ConfigError::InvalidRestDuration);
        }
        if self.update_stripes == 0 {
            return Err(ConfigError::InvalidStripeCount);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions must be non-zero")]
    InvalidDimensions,
    #[error("Search radius must be a non-zero even integer, got {0}")]
    InvalidSearchRadius(usize),
    #[error("Search radius {radius} exceeds grid dimensions {width}x{height}")]
    SearchRadiusExceedsGrid {
        radius: usize,
        width: usize,
        height: usize,
    },
    #[error("Action-potential duration must be non-zero")]
    InvalidApDuration,
    #[error("Refractory duration must be non-zero")]
    InvalidRestDuration,
    #[error("Update stripe count must be non-zero")]
    InvalidStripeCount,
}
