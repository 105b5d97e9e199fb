//! The clipping engine.

use std::sync::Arc;

use aoi_map_area_models::{AreaEntry, AreaId, AreaState, AreaType, LayerResult, LayerResults};
use aoi_map_geometry as geometry;
use aoi_map_layers::LayerRegistry;
use aoi_map_layers_models::FeatureCollection;
use geo::Geometry;

use crate::config::AnalysisConfig;
use crate::metrics::aggregate;
use crate::progress::{ProgressSink, emit};
use crate::{AnalysisError, AreaMetrics, CancelFlag};

/// Progress reported once the clip area is built.
const CLIP_DONE_PERCENT: f64 = 5.0;
/// Progress range shared by the layers.
const LAYERS_START_PERCENT: f64 = 10.0;
const LAYERS_END_PERCENT: f64 = 95.0;

/// Outcome of a completed run. The same data is stored on the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// Analyzed area.
    pub area_id: AreaId,
    /// Polygon (or buffer) the layers were clipped against.
    pub clip_area: Geometry<f64>,
    /// Aggregate metrics.
    pub metrics: AreaMetrics,
    /// Matches per processed layer.
    pub per_layer_results: LayerResults,
}

/// Clips reference layers against areas of interest.
#[derive(Debug, Clone)]
pub struct AnalysisEngine {
    registry: Arc<LayerRegistry>,
}

impl AnalysisEngine {
    /// Creates an engine over a loaded registry.
    #[must_use]
    pub const fn new(registry: Arc<LayerRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this engine reads.
    #[must_use]
    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    /// Runs a full analysis of `entry`.
    ///
    /// Layers are processed in registration order; selected keys that are
    /// not registered come last, sorted, as skipped empty results. The
    /// entry moves to [`AreaState::Analyzed`] on success and to
    /// [`AreaState::Failed`] on any error after the run started, including
    /// when the returned future is dropped before completion.
    ///
    /// # Errors
    ///
    /// * [`AnalysisError::InvalidConfig`] if `config` is rejected (the
    ///   entry is left untouched)
    /// * [`AnalysisError::InvalidState`] if the entry is already analyzing
    /// * [`AnalysisError::MissingInput`] if the entry has no polygon
    /// * [`AnalysisError::Geometry`] if buffering or an intersection test
    ///   fails
    /// * [`AnalysisError::Cancelled`] if `cancel` fires
    pub async fn analyze(
        &self,
        entry: &mut AreaEntry,
        config: &AnalysisConfig,
        progress: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<AnalysisResult, AnalysisError> {
        config.validate()?;
        entry.begin_analysis(config.area_type, config.effective_buffer_km())?;

        log::info!(
            "Analyzing area {} ({}) as {}",
            entry.id(),
            entry.name(),
            config.area_type
        );

        let run = RunGuard { entry };
        let outcome = self.run(&*run.entry, config, progress, cancel).await;

        match outcome {
            Ok(result) => {
                run.entry.complete(
                    result.clip_area.clone(),
                    result.per_layer_results.clone(),
                    result.metrics.clone(),
                )?;
                log::info!(
                    "Area {} analyzed: {:.3} km², {} elements",
                    result.area_id,
                    result.metrics.area_km2,
                    result.metrics.total_elements
                );
                Ok(result)
            }
            Err(e) => {
                run.entry.fail(e.to_string())?;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        entry: &AreaEntry,
        config: &AnalysisConfig,
        progress: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<AnalysisResult, AnalysisError> {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let source = entry
            .source_polygon()
            .and_then(|feature| feature.geometry.as_ref())
            .ok_or_else(|| AnalysisError::MissingInput {
                area: entry.name().to_string(),
            })?;

        emit(progress, 0.0, "Building clip area");
        let clip_area = build_clip_area(source, config)?;

        let area_km2 = geometry::area_km2(&clip_area).unwrap_or_else(|e| {
            log::warn!("Area {}: cannot measure clip area: {e}", entry.id());
            0.0
        });
        let perimeter_km = geometry::length_km(source).unwrap_or_else(|e| {
            log::warn!("Area {}: cannot measure perimeter: {e}", entry.id());
            0.0
        });
        emit(progress, CLIP_DONE_PERCENT, "Clip area ready");

        let keys = self.layer_order(config);
        let mut results = LayerResults::new();

        #[allow(clippy::cast_precision_loss)]
        let step = (LAYERS_END_PERCENT - LAYERS_START_PERCENT) / keys.len().max(1) as f64;

        for (index, key) in keys.iter().enumerate() {
            let result = self
                .clip_layer(key, &clip_area, config.batch_size, cancel)
                .await?;

            log::debug!(
                "Area {}: {key} matched {} features",
                entry.id(),
                result.features.len()
            );

            #[allow(clippy::cast_precision_loss)]
            let percent = step.mul_add((index + 1) as f64, LAYERS_START_PERCENT);
            emit(
                progress,
                percent,
                &format!("{key}: {} matches", result.features.len()),
            );
            results.push(result);
        }

        let metrics = aggregate(
            area_km2,
            perimeter_km,
            &results,
            &self.registry,
            &config.overlap_layers,
        );
        emit(progress, 100.0, "Analysis complete");

        Ok(AnalysisResult {
            area_id: entry.id(),
            clip_area,
            metrics,
            per_layer_results: results,
        })
    }

    /// Selected registered keys in registration order, then selected
    /// unregistered keys in sorted order.
    fn layer_order(&self, config: &AnalysisConfig) -> Vec<String> {
        let mut keys: Vec<String> = self
            .registry
            .list_keys()
            .into_iter()
            .filter(|key| config.is_selected(key))
            .map(str::to_string)
            .collect();

        if let Some(selected) = &config.selected_layers {
            keys.extend(
                selected
                    .iter()
                    .filter(|key| !self.registry.contains(key))
                    .cloned(),
            );
        }

        keys
    }

    /// Tests every feature of one layer against `clip_area`, in batches of
    /// `batch_size`. Yields to the runtime and checks `cancel` between
    /// batches.
    async fn clip_layer(
        &self,
        key: &str,
        clip_area: &Geometry<f64>,
        batch_size: usize,
        cancel: &CancelFlag,
    ) -> Result<LayerResult, AnalysisError> {
        let skipped = || LayerResult {
            key: key.to_string(),
            features: FeatureCollection::new(),
            skipped: true,
        };

        let Some(layer) = self.registry.get(key) else {
            log::debug!("{key}: layer not loaded, skipping");
            return Ok(skipped());
        };
        if layer.is_empty() {
            log::debug!("{key}: layer is empty, skipping");
            return Ok(skipped());
        }

        let mut matched = FeatureCollection::new();

        for (position, feature) in layer.features.iter().enumerate() {
            if position % batch_size == 0 {
                if position > 0 {
                    tokio::task::yield_now().await;
                }
                if cancel.is_cancelled() {
                    return Err(AnalysisError::Cancelled);
                }
            }

            let Some(candidate) = &feature.geometry else {
                continue;
            };

            let hit = geometry::intersects(clip_area, candidate).map_err(|source| {
                AnalysisError::Geometry {
                    layer: Some(key.to_string()),
                    source,
                }
            })?;
            if hit {
                matched.push(feature.clone());
            }
        }

        tokio::task::yield_now().await;

        Ok(LayerResult {
            key: key.to_string(),
            features: matched,
            skipped: false,
        })
    }
}

fn build_clip_area(
    source: &Geometry<f64>,
    config: &AnalysisConfig,
) -> Result<Geometry<f64>, AnalysisError> {
    if let Some(radius_km) = config.effective_buffer_km() {
        return geometry::buffer_km(source, radius_km)
            .map_err(|source| AnalysisError::Geometry { layer: None, source });
    }

    if matches!(
        config.area_type,
        AreaType::DirectInfluence | AreaType::IndirectInfluence
    ) {
        log::debug!(
            "{} has no derivation rule yet, using the polygon as uploaded",
            config.area_type
        );
    }

    Ok(source.clone())
}

/// Marks the entry failed if a run is dropped mid-flight.
struct RunGuard<'a> {
    entry: &'a mut AreaEntry,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.entry.state() == AreaState::Analyzing {
            let _ = self.entry.fail("analysis abandoned before completion");
        }
    }
}
