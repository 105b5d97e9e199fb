#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reference layer definition types.
//!
//! Defines the TOML schema describing each reference dataset (display
//! name, identifying property, styling hint, field mapping, and how the
//! layer feeds the aggregate metrics), plus the loaded [`ReferenceLayer`]
//! and the [`Feature`] / [`FeatureCollection`] types shared by the whole
//! workspace.

pub mod feature;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display};

pub use feature::{Feature, FeatureCollection, Properties, value_number, value_text};

/// A reference dataset description, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDefinition {
    /// Stable lookup key used by the engine, reports, and renderers
    /// (e.g., `"localidades"`).
    pub key: String,
    /// Human-readable name (e.g., "Localidades INEGI").
    pub display_name: String,
    /// Property that identifies a feature within the layer.
    pub primary_property: String,
    /// Rendering hint for map overlays.
    #[serde(default)]
    pub style: LayerStyle,
    /// Candidate property keys for well-known fields.
    #[serde(default)]
    pub fields: FieldMapping,
    /// How matches in this layer feed the aggregate metrics.
    #[serde(default)]
    pub metrics: LayerMetrics,
}

impl LayerDefinition {
    /// Creates a definition with default style, fields, and metrics.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        display_name: impl Into<String>,
        primary_property: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            primary_property: primary_property.into(),
            style: LayerStyle::default(),
            fields: FieldMapping::default(),
            metrics: LayerMetrics::default(),
        }
    }

    /// Replaces the field mapping.
    #[must_use]
    pub fn with_fields(mut self, fields: FieldMapping) -> Self {
        self.fields = fields;
        self
    }

    /// Replaces the metrics policy.
    #[must_use]
    pub fn with_metrics(mut self, metrics: LayerMetrics) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Map styling hint. Renderers are free to ignore it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    /// Stroke/fill colour as a CSS hex string.
    pub color: String,
    /// Fill opacity in `[0, 1]`.
    #[serde(default = "default_fill_opacity")]
    pub fill_opacity: f64,
}

const fn default_fill_opacity() -> f64 {
    0.2
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            color: "#3388ff".to_string(),
            fill_opacity: default_fill_opacity(),
        }
    }
}

/// Well-known fields whose key differs between datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    /// Feature name.
    Name,
    /// State (entidad) name.
    State,
    /// Municipality name.
    Municipality,
    /// Total population.
    Population,
}

/// Candidate property keys per well-known field, tried in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Name keys (e.g., `NOMGEO`, `NOM_LOC`, `NOMBRE`).
    #[serde(default)]
    pub name: Vec<String>,
    /// State keys.
    #[serde(default)]
    pub state: Vec<String>,
    /// Municipality keys.
    #[serde(default)]
    pub municipality: Vec<String>,
    /// Population keys (e.g., `POBTOT`, `POBTOTAL`).
    #[serde(default)]
    pub population: Vec<String>,
}

impl FieldMapping {
    /// Candidate keys for `field`, in priority order.
    #[must_use]
    pub fn candidates(&self, field: Field) -> &[String] {
        match field {
            Field::Name => &self.name,
            Field::State => &self.state,
            Field::Municipality => &self.municipality,
            Field::Population => &self.population,
        }
    }

    /// Returns the first candidate value that is present and not `null`.
    #[must_use]
    pub fn resolve<'a>(&self, field: Field, properties: &'a Properties) -> Option<&'a Value> {
        self.candidates(field)
            .iter()
            .filter_map(|key| properties.get(key))
            .find(|value| !value.is_null())
    }

    /// Returns the first candidate that renders as non-empty text.
    #[must_use]
    pub fn resolve_text(&self, field: Field, properties: &Properties) -> Option<String> {
        self.candidates(field)
            .iter()
            .filter_map(|key| properties.get(key))
            .find_map(value_text)
    }

    /// Returns the first candidate that reads as a number.
    #[must_use]
    pub fn resolve_number(&self, field: Field, properties: &Properties) -> Option<f64> {
        self.candidates(field)
            .iter()
            .filter_map(|key| properties.get(key))
            .find_map(value_number)
    }
}

/// How a layer's matched features are counted in `total_elements`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    /// One per matched feature.
    #[default]
    Features,
    /// One per distinct value of the primary property. Used for layers
    /// where many features share a label (indigenous language points).
    DistinctPrimary,
}

/// How a layer feeds the aggregate metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerMetrics {
    /// Counting rule for `total_elements`.
    #[serde(default)]
    pub count: CountMode,
    /// Matched features contribute to `total_population`.
    #[serde(default)]
    pub population: bool,
    /// Matched features count as localities for `locality_density`.
    #[serde(default)]
    pub localities: bool,
    /// Any match sets an overlap flag (protected / sensitive layers).
    #[serde(default)]
    pub overlap_flag: bool,
}

/// A loaded reference dataset.
///
/// Features are never mutated after load; replacing a layer means
/// building a new [`ReferenceLayer`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceLayer {
    /// Layer metadata.
    pub definition: LayerDefinition,
    /// Features in source order.
    pub features: FeatureCollection,
}

impl ReferenceLayer {
    /// Creates a layer from its definition and features.
    #[must_use]
    pub const fn new(definition: LayerDefinition, features: FeatureCollection) -> Self {
        Self {
            definition,
            features,
        }
    }

    /// Returns the layer key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.definition.key
    }

    /// Returns the human-readable layer name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.definition.display_name
    }

    /// Returns the identifying property key.
    #[must_use]
    pub fn primary_property(&self) -> &str {
        &self.definition.primary_property
    }

    /// Whether the layer has no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
