//! Waveform pipeline configuration
//!
//! - Generic YAML config loading/saving
//! - Standard config file location
//! - [`WaveformConfig`]: reducers, windowing and feed settings
//!
//! # Usage
//!
//! ```ignore
//! use wavescope_core::config::{default_config_path, load_config, WaveformConfig};
//!
//! let config: WaveformConfig = load_config(&default_config_path());
//! let plot = PlotModel::new(config, Bounds::new(800.0, 120.0));
//! ```

mod io;
mod paths;

pub use io::{load_config, read_config, save_config};
pub use paths::{default_config_dir, default_config_path, CONFIG_FILENAME};

use serde::{Deserialize, Serialize};

use crate::error::{WaveformError, WaveformResult};
use crate::feed::DEFAULT_FEED_CAPACITY;
use crate::geometry::DEFAULT_BOUNDARY_EPSILON;
use crate::reducer::{ReducerKind, TrailingBlockPolicy};
use crate::viewport::DEFAULT_MAX_SCALE;

/// Number of reduced points the whole track is drawn with at scale 1
pub const DEFAULT_POINTS_ON_PLOT: usize = 512;

/// Block size used when neither the config nor the source length decides one
pub const FALLBACK_BLOCK_SIZE: usize = 256;

/// Default number of feed events applied per pump
pub const DEFAULT_MAX_EVENTS_PER_PUMP: usize = 256;

/// A derived channel to create for every source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducerConfig {
    /// Channel name; the identifier becomes `"<source>.<name>"`
    pub name: String,
    pub kind: ReducerKind,
    /// Fixed block size; `None` derives it from the source length
    #[serde(default)]
    pub block_size: Option<usize>,
}

impl ReducerConfig {
    pub fn new(kind: ReducerKind) -> Self {
        Self {
            name: kind.name().to_string(),
            kind,
            block_size: None,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Block size for a source of `expected_raw_len` samples
    ///
    /// Automatic sizing spreads the track over `points_on_plot` reduced values.
    pub fn resolve_block_size(&self, expected_raw_len: Option<usize>, points_on_plot: usize) -> usize {
        match (self.block_size, expected_raw_len) {
            (Some(size), _) => size,
            (None, Some(len)) => (len / points_on_plot.max(1)).max(1),
            (None, None) => FALLBACK_BLOCK_SIZE,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    /// Reduced points per track at scale 1 (drives automatic block sizes)
    pub points_on_plot: usize,
    /// Derived channels created for every source
    pub reducers: Vec<ReducerConfig>,
    /// Handling of the partial block at stream end
    pub trailing_block: TrailingBlockPolicy,
    /// Windowing boundary guard
    pub boundary_epsilon: f64,
    /// Zoom limit
    pub max_scale: f64,
    /// Undrained events a feed holds before producers block
    pub feed_capacity: usize,
    /// Feed events applied per source per pump
    pub max_events_per_pump: usize,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            points_on_plot: DEFAULT_POINTS_ON_PLOT,
            reducers: vec![
                ReducerConfig::new(ReducerKind::Max),
                ReducerConfig::new(ReducerKind::Average),
            ],
            trailing_block: TrailingBlockPolicy::Flush,
            boundary_epsilon: DEFAULT_BOUNDARY_EPSILON,
            max_scale: DEFAULT_MAX_SCALE,
            feed_capacity: DEFAULT_FEED_CAPACITY,
            max_events_per_pump: DEFAULT_MAX_EVENTS_PER_PUMP,
        }
    }
}

impl WaveformConfig {
    /// Reject settings that would fail later at reducer creation
    pub fn validate(&self) -> WaveformResult<()> {
        for reducer in &self.reducers {
            if reducer.block_size == Some(0) {
                return Err(WaveformError::InvalidBlockSize(0));
            }
        }
        Ok(())
    }
}
