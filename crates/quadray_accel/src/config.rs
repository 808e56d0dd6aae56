//! Build parameters for the spatial-split QBVH.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default leaf size.
pub const DEFAULT_MAX_PRIMS_PER_LEAF: u32 = 4;

/// Default overlap ratio above which a spatial split is evaluated.
pub const DEFAULT_ALPHA: f32 = 1e-5;

/// Parameters controlling how the QBVH is built.
///
/// `full_sweep_threshold` and `skip_factor` are accepted so parameter blocks
/// written for other BVH builders load unchanged; the binned builder does not
/// read them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConfigParams")]
pub struct QbvhConfig {
    /// Subsets at or below this size become leaves.
    pub max_prims_per_leaf: u32,
    pub full_sweep_threshold: u32,
    pub skip_factor: u32,
    /// Minimum (child overlap area / children union area) before a spatial
    /// split is considered.
    pub alpha: f32,
    /// Allow spatial splits to replace object splits when they are cheaper.
    pub spatial_splits: bool,
}

impl Default for QbvhConfig {
    fn default() -> Self {
        Self {
            max_prims_per_leaf: DEFAULT_MAX_PRIMS_PER_LEAF,
            full_sweep_threshold: 4 * DEFAULT_MAX_PRIMS_PER_LEAF,
            skip_factor: 1,
            alpha: DEFAULT_ALPHA,
            spatial_splits: false,
        }
    }
}

impl QbvhConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON parameter block such as `{"maxprimsperleaf": 8}`.
    ///
    /// Keys use either the snake_case field names or the flat lowercase
    /// names of scene files. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the leaf size.
    pub fn with_max_prims_per_leaf(mut self, max_prims_per_leaf: u32) -> Self {
        self.max_prims_per_leaf = max_prims_per_leaf;
        self
    }

    /// Set the spatial-split overlap threshold.
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Enable or disable spatial splits.
    pub fn with_spatial_splits(mut self, enabled: bool) -> Self {
        self.spatial_splits = enabled;
        self
    }

    /// Returns a copy with out-of-range values corrected.
    pub(crate) fn validated(self) -> Self {
        let mut config = self;
        if config.max_prims_per_leaf == 0 {
            log::warn!("max_prims_per_leaf must be at least 1, using 1");
            config.max_prims_per_leaf = 1;
        }
        config
    }
}

/// Wire form of [`QbvhConfig`]: every key optional.
#[derive(Deserialize)]
struct ConfigParams {
    #[serde(default, alias = "maxprimsperleaf")]
    max_prims_per_leaf: Option<u32>,
    #[serde(default, alias = "fullsweepthreshold")]
    full_sweep_threshold: Option<u32>,
    #[serde(default, alias = "skipfactor")]
    skip_factor: Option<u32>,
    #[serde(default)]
    alpha: Option<f32>,
    #[serde(default, alias = "spatialsplits")]
    spatial_splits: Option<bool>,
}

impl From<ConfigParams> for QbvhConfig {
    fn from(params: ConfigParams) -> Self {
        let defaults = QbvhConfig::default();
        let max_prims_per_leaf = params
            .max_prims_per_leaf
            .unwrap_or(defaults.max_prims_per_leaf);

        Self {
            max_prims_per_leaf,
            full_sweep_threshold: params
                .full_sweep_threshold
                .unwrap_or(4 * max_prims_per_leaf),
            skip_factor: params.skip_factor.unwrap_or(defaults.skip_factor),
            alpha: params.alpha.unwrap_or(defaults.alpha),
            spatial_splits: params.spatial_splits.unwrap_or(defaults.spatial_splits),
        }
    }
}
