#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incremental clipping and metrics engine for areas of interest.
//!
//! [`AnalysisEngine::analyze`] derives an area's clip area, intersects it
//! with every selected reference layer in registration order, and
//! aggregates the matches into [`AreaMetrics`]. Features are tested in
//! fixed-size batches and the engine yields to the async runtime between
//! batches, so a single-threaded host stays responsive and can cancel a
//! run at any batch boundary.

pub mod cancel;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod progress;

pub use cancel::CancelFlag;
pub use config::AnalysisConfig;
pub use engine::{AnalysisEngine, AnalysisResult};
pub use progress::{NullProgress, ProgressSink, ScaledProgress};

use aoi_map_area_models::AreaStateError;
use aoi_map_geometry::GeometryError;
use thiserror::Error;

pub use aoi_map_area_models::AreaMetrics;

/// Errors that abort an analysis run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The upload has no polygon to analyze.
    #[error("Area '{area}' has no Polygon or MultiPolygon feature")]
    MissingInput {
        /// Area name.
        area: String,
    },

    /// A geometry primitive rejected its input.
    #[error("Geometry error in {}: {source}", .layer.as_deref().unwrap_or("clip area"))]
    Geometry {
        /// Layer being processed, or `None` while building the clip area.
        layer: Option<String>,
        /// Underlying primitive failure.
        source: GeometryError,
    },

    /// The configuration was rejected before the run started.
    #[error("Invalid analysis config: {message}")]
    InvalidConfig {
        /// Description of what went wrong.
        message: String,
    },

    /// The area cannot start a run in its current state.
    #[error(transparent)]
    InvalidState(#[from] AreaStateError),

    /// The run was cancelled at a batch boundary.
    #[error("Analysis cancelled")]
    Cancelled,
}
