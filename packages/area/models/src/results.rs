//! Per-layer clip results and aggregate metrics of an analysis run.

use std::collections::BTreeMap;

use aoi_map_layers_models::FeatureCollection;
use serde::Serialize;

/// The clipped subset of one reference layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerResult {
    /// Reference layer key.
    pub key: String,
    /// Matched features, in the layer's original order.
    pub features: FeatureCollection,
    /// The layer was selected but missing or empty in the registry, so it
    /// was skipped and contributes nothing.
    pub skipped: bool,
}

/// Results for every processed layer, in processing order.
///
/// A key that is absent was not processed; a key with an empty
/// collection was processed and matched nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerResults {
    results: Vec<LayerResult>,
}

impl LayerResults {
    /// Creates an empty result set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            results: Vec::new(),
        }
    }

    /// Records the result of one layer.
    pub fn push(&mut self, result: LayerResult) {
        self.results.push(result);
    }

    /// Matched features for `key`, if the layer was processed.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FeatureCollection> {
        self.result(key).map(|result| &result.features)
    }

    /// The full result entry for `key`.
    #[must_use]
    pub fn result(&self, key: &str) -> Option<&LayerResult> {
        self.results.iter().find(|result| result.key == key)
    }

    /// Number of matches in `key`, or zero if it was not processed.
    #[must_use]
    pub fn matched_count(&self, key: &str) -> usize {
        self.get(key).map_or(0, FeatureCollection::len)
    }

    /// Processed layer keys, in processing order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|result| result.key.as_str())
    }

    /// Iterates results in processing order.
    pub fn iter(&self) -> std::slice::Iter<'_, LayerResult> {
        self.results.iter()
    }

    /// Number of processed layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no layer was processed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl<'a> IntoIterator for &'a LayerResults {
    type Item = &'a LayerResult;
    type IntoIter = std::slice::Iter<'a, LayerResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// How many elements one layer contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerCount {
    /// Reference layer key.
    pub key: String,
    /// Number of matched features.
    pub matched: u64,
    /// Contribution to `total_elements` (distinct labels for layers
    /// counted by primary property).
    pub counted: u64,
}

/// Aggregate metrics of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaMetrics {
    /// Area of the clip area in km².
    pub area_km2: f64,
    /// Perimeter of the source polygon (not the buffer) in km.
    pub perimeter_km: f64,
    /// Sum of per-layer contributions.
    pub total_elements: u64,
    /// Population of matched localities.
    pub total_population: u64,
    /// Population per km², zero when the area is zero.
    pub population_density: f64,
    /// Matched localities per km², zero when the area is zero.
    pub locality_density: f64,
    /// Per-layer contributions, in processing order.
    pub layer_counts: Vec<LayerCount>,
    /// Whether the area overlaps each protected / sensitive layer.
    pub overlap_flags: BTreeMap<String, bool>,
}
