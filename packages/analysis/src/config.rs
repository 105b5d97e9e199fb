//! Analysis run configuration.
//!
//! Every recognized option is a typed field with a documented default.
//! Configs can be built in code or read from TOML, and are validated
//! before a run touches any area.

use std::collections::BTreeSet;

use aoi_map_area_models::AreaType;
use serde::{Deserialize, Serialize};

use crate::AnalysisError;

/// Buffer radius used for [`AreaType::Core`] when none is given.
pub const DEFAULT_BUFFER_KM: f64 = 0.5;

/// Features tested between two yields to the runtime.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Options for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// How the clip area is derived. Default: [`AreaType::Exact`].
    pub area_type: AreaType,
    /// Buffer radius in km for [`AreaType::Core`]. Default:
    /// [`DEFAULT_BUFFER_KM`]. Ignored by the other area types.
    pub buffer_km: Option<f64>,
    /// Layers to intersect. `None` selects every registered layer.
    pub selected_layers: Option<BTreeSet<String>>,
    /// Features per batch. Default: [`DEFAULT_BATCH_SIZE`].
    pub batch_size: usize,
    /// Layers that get an overlap flag in the metrics. Default: the
    /// catalogued layers marked `overlap_flag`.
    pub overlap_layers: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            area_type: AreaType::default(),
            buffer_km: None,
            selected_layers: None,
            batch_size: DEFAULT_BATCH_SIZE,
            overlap_layers: aoi_map_layers::catalog::overlap_layer_keys(),
        }
    }
}

impl AnalysisConfig {
    /// Parses a config from TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidConfig`] if the TOML is malformed
    /// or the resulting config fails [`Self::validate`].
    pub fn from_toml_str(toml_str: &str) -> Result<Self, AnalysisError> {
        let config: Self =
            toml::de::from_str(toml_str).map_err(|e| AnalysisError::InvalidConfig {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the area type.
    #[must_use]
    pub const fn with_area_type(mut self, area_type: AreaType) -> Self {
        self.area_type = area_type;
        self
    }

    /// Sets the buffer radius.
    #[must_use]
    pub const fn with_buffer_km(mut self, buffer_km: f64) -> Self {
        self.buffer_km = Some(buffer_km);
        self
    }

    /// Restricts the run to the given layer keys.
    #[must_use]
    pub fn with_layers<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_layers = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// The buffer radius a run will apply, if any.
    #[must_use]
    pub fn effective_buffer_km(&self) -> Option<f64> {
        self.area_type
            .requires_buffer()
            .then(|| self.buffer_km.unwrap_or(DEFAULT_BUFFER_KM))
    }

    /// Whether `key` is selected.
    #[must_use]
    pub fn is_selected(&self, key: &str) -> bool {
        self.selected_layers
            .as_ref()
            .is_none_or(|selected| selected.contains(key))
    }

    /// Checks option ranges.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidConfig`] for a negative or
    /// non-finite buffer, a non-positive [`AreaType::Core`] buffer, or a
    /// zero batch size.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if let Some(buffer_km) = self.buffer_km {
            if !buffer_km.is_finite() || buffer_km < 0.0 {
                return Err(AnalysisError::InvalidConfig {
                    message: format!("buffer_km must be a finite value >= 0 (got {buffer_km})"),
                });
            }
            if self.area_type.requires_buffer() && buffer_km <= 0.0 {
                return Err(AnalysisError::InvalidConfig {
                    message: format!("buffer_km must be > 0 for the {} area type", self.area_type),
                });
            }
        }

        if self.batch_size == 0 {
            return Err(AnalysisError::InvalidConfig {
                message: "batch_size must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}
