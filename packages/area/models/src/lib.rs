#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Area-of-interest entries and their lifecycle.
//!
//! An [`AreaEntry`] is one uploaded polygon plus everything derived from
//! it by an analysis run: the clip area, per-layer results, and
//! aggregate metrics. Its [`AreaState`] guards the derived data, which is
//! only readable once the entry is [`AreaState::Analyzed`].

pub mod results;

use std::path::Path;

use aoi_map_layers_models::{Feature, FeatureCollection};
use geo::Geometry;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub use results::{AreaMetrics, LayerCount, LayerResult, LayerResults};

/// Unique, monotonically assigned area identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AreaId(pub u64);

impl std::fmt::Display for AreaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How the clip area is derived from the source polygon.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AreaType {
    /// The polygon as uploaded.
    #[default]
    Exact,
    /// The polygon buffered outward.
    Core,
    /// Direct influence zone. Currently the unbuffered polygon.
    DirectInfluence,
    /// Indirect influence zone. Currently the unbuffered polygon.
    IndirectInfluence,
}

impl AreaType {
    /// Whether the clip area is a buffer of the source polygon.
    #[must_use]
    pub const fn requires_buffer(self) -> bool {
        matches!(self, Self::Core)
    }
}

/// Lifecycle state of an [`AreaEntry`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AreaState {
    /// Uploaded, never analyzed.
    Created,
    /// A run is in progress.
    Analyzing,
    /// The last run completed; results and metrics are valid.
    Analyzed,
    /// The last run aborted.
    Failed,
}

impl AreaState {
    /// Whether a new run may start from this state.
    #[must_use]
    pub const fn can_start(self) -> bool {
        !matches!(self, Self::Analyzing)
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("area {id} cannot {action} while {state}")]
pub struct AreaStateError {
    /// Area that rejected the transition.
    pub id: AreaId,
    /// State the area was in.
    pub state: AreaState,
    /// Attempted transition.
    pub action: &'static str,
}

/// One uploaded area of interest.
#[derive(Debug, Clone)]
pub struct AreaEntry {
    id: AreaId,
    name: String,
    source_polygon: Option<Feature>,
    area_type: AreaType,
    buffer_km: Option<f64>,
    clip_area: Option<Geometry<f64>>,
    state: AreaState,
    failure: Option<String>,
    results: LayerResults,
    metrics: Option<AreaMetrics>,
}

impl AreaEntry {
    /// Creates an entry in the [`AreaState::Created`] state from the
    /// converted upload. See [`extract_source_polygon`] for which feature
    /// becomes the source polygon.
    #[must_use]
    pub fn new(id: AreaId, name: impl Into<String>, upload: &FeatureCollection) -> Self {
        let name = name.into();
        let source_polygon = extract_source_polygon(upload);

        let polygons = upload.iter().filter(|feature| feature.is_polygonal()).count();
        if polygons > 1 {
            log::warn!(
                "Area {id} ({name}): upload has {polygons} polygons, only the first is analyzed"
            );
        }
        if source_polygon.is_none() {
            log::warn!("Area {id} ({name}): upload has no Polygon or MultiPolygon feature");
        }

        Self {
            id,
            name,
            source_polygon,
            area_type: AreaType::default(),
            buffer_km: None,
            clip_area: None,
            state: AreaState::Created,
            failure: None,
            results: LayerResults::new(),
            metrics: None,
        }
    }

    /// Returns the area identifier.
    #[must_use]
    pub const fn id(&self) -> AreaId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the polygon feature the analysis runs on.
    #[must_use]
    pub const fn source_polygon(&self) -> Option<&Feature> {
        self.source_polygon.as_ref()
    }

    /// Returns the area type of the latest run.
    #[must_use]
    pub const fn area_type(&self) -> AreaType {
        self.area_type
    }

    /// Returns the buffer radius of the latest run.
    #[must_use]
    pub const fn buffer_km(&self) -> Option<f64> {
        self.buffer_km
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> AreaState {
        self.state
    }

    /// Returns why the last run failed.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Returns the clip area of the last completed run.
    #[must_use]
    pub fn clip_area(&self) -> Option<&Geometry<f64>> {
        self.valid().and(self.clip_area.as_ref())
    }

    /// Returns per-layer results, only while [`AreaState::Analyzed`].
    #[must_use]
    pub fn results(&self) -> Option<&LayerResults> {
        self.valid().map(|()| &self.results)
    }

    /// Returns metrics, only while [`AreaState::Analyzed`].
    #[must_use]
    pub fn metrics(&self) -> Option<&AreaMetrics> {
        self.valid().and(self.metrics.as_ref())
    }

    fn valid(&self) -> Option<()> {
        (self.state == AreaState::Analyzed).then_some(())
    }

    /// Starts a run, discarding results of any previous run.
    ///
    /// # Errors
    ///
    /// Returns [`AreaStateError`] if a run is already in progress.
    pub fn begin_analysis(
        &mut self,
        area_type: AreaType,
        buffer_km: Option<f64>,
    ) -> Result<(), AreaStateError> {
        if !self.state.can_start() {
            return Err(self.state_error("start analysis"));
        }

        self.state = AreaState::Analyzing;
        self.area_type = area_type;
        self.buffer_km = buffer_km;
        self.clip_area = None;
        self.failure = None;
        self.results = LayerResults::new();
        self.metrics = None;
        Ok(())
    }

    /// Finishes a run successfully.
    ///
    /// # Errors
    ///
    /// Returns [`AreaStateError`] if no run is in progress.
    pub fn complete(
        &mut self,
        clip_area: Geometry<f64>,
        results: LayerResults,
        metrics: AreaMetrics,
    ) -> Result<(), AreaStateError> {
        if self.state != AreaState::Analyzing {
            return Err(self.state_error("complete analysis"));
        }

        self.clip_area = Some(clip_area);
        self.results = results;
        self.metrics = Some(metrics);
        self.state = AreaState::Analyzed;
        Ok(())
    }

    /// Aborts a run, recording why.
    ///
    /// # Errors
    ///
    /// Returns [`AreaStateError`] if no run is in progress.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), AreaStateError> {
        if self.state != AreaState::Analyzing {
            return Err(self.state_error("fail analysis"));
        }

        let reason = reason.into();
        log::warn!("Area {} ({}) failed: {reason}", self.id, self.name);
        self.failure = Some(reason);
        self.clip_area = None;
        self.results = LayerResults::new();
        self.metrics = None;
        self.state = AreaState::Failed;
        Ok(())
    }

    const fn state_error(&self, action: &'static str) -> AreaStateError {
        AreaStateError {
            id: self.id,
            state: self.state,
            action,
        }
    }
}

/// Picks the polygon an area is analyzed on: the first `Polygon` or
/// `MultiPolygon` feature of the upload.
///
/// An area holds exactly one polygon. Later polygons in a multi-feature
/// upload are ignored.
#[must_use]
pub fn extract_source_polygon(upload: &FeatureCollection) -> Option<Feature> {
    upload.iter().find(|feature| feature.is_polygonal()).cloned()
}

/// Derives an area name from the uploaded file's path (its stem).
#[must_use]
pub fn area_name_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().trim().to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "area".to_string())
}
