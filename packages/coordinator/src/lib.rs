#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Multi-area coordination.
//!
//! An [`AreaCoordinator`] owns every area of interest in a session, hands
//! out their ids, and runs analyses one area at a time. Bulk runs are
//! exposed as a stream of [`AreaOutcome`]s so callers can report each area
//! as soon as it finishes; a failing area never stops the others.

use std::sync::Arc;

use aoi_map_analysis::{
    AnalysisConfig, AnalysisEngine, AnalysisError, AnalysisResult, CancelFlag, ProgressSink,
    ScaledProgress,
};
use aoi_map_area_models::{AreaEntry, AreaId, AreaState, AreaStateError};
use aoi_map_layers::LayerRegistry;
use aoi_map_layers_models::FeatureCollection;
use futures::{Stream, StreamExt as _};
use thiserror::Error;

/// Maximum number of areas a coordinator holds unless configured
/// otherwise.
pub const DEFAULT_CAPACITY: usize = 10;

/// Errors returned by [`AreaCoordinator`] operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Adding another area would exceed the capacity.
    #[error("Area limit reached ({capacity} areas)")]
    CapacityExceeded {
        /// Configured capacity.
        capacity: usize,
    },

    /// No area has the given id.
    #[error("Area {id} not found")]
    NotFound {
        /// Requested id.
        id: AreaId,
    },

    /// The area cannot be analyzed in its current state.
    #[error(transparent)]
    InvalidState(#[from] AreaStateError),

    /// The analysis itself failed.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Result of one area in a bulk run.
#[derive(Debug)]
pub struct AreaOutcome {
    /// Area id.
    pub area_id: AreaId,
    /// Area name.
    pub name: String,
    /// The run's result on success, the error that failed the area
    /// otherwise.
    pub result: Result<AnalysisResult, AnalysisError>,
}

impl AreaOutcome {
    /// Whether the area was analyzed successfully.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Owns a session's areas and drives their analyses.
#[derive(Debug)]
pub struct AreaCoordinator {
    engine: AnalysisEngine,
    entries: Vec<AreaEntry>,
    next_id: u64,
    capacity: usize,
}

impl AreaCoordinator {
    /// Creates a coordinator with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub const fn new(registry: Arc<LayerRegistry>) -> Self {
        Self::with_capacity(registry, DEFAULT_CAPACITY)
    }

    /// Creates a coordinator holding at most `capacity` areas.
    #[must_use]
    pub const fn with_capacity(registry: Arc<LayerRegistry>, capacity: usize) -> Self {
        Self {
            engine: AnalysisEngine::new(registry),
            entries: Vec::new(),
            next_id: 1,
            capacity,
        }
    }

    /// The analysis engine shared by all areas.
    #[must_use]
    pub const fn engine(&self) -> &AnalysisEngine {
        &self.engine
    }

    /// Adds an area built from a converted upload.
    ///
    /// Ids are never reused, even after [`Self::remove_area`].
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::CapacityExceeded`] if the coordinator is
    /// full.
    pub fn add_area(
        &mut self,
        upload: &FeatureCollection,
        name: impl Into<String>,
    ) -> Result<&AreaEntry, CoordinatorError> {
        if self.entries.len() >= self.capacity {
            return Err(CoordinatorError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let id = AreaId(self.next_id);
        self.next_id += 1;

        let entry = AreaEntry::new(id, name, upload);
        log::info!("Added area {id} ({})", entry.name());

        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Removes an area. Unknown ids are ignored.
    pub fn remove_area(&mut self, id: AreaId) -> Option<AreaEntry> {
        let position = self.entries.iter().position(|entry| entry.id() == id)?;
        log::info!("Removed area {id}");
        Some(self.entries.remove(position))
    }

    /// Removes every area.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Looks up an area.
    #[must_use]
    pub fn get(&self, id: AreaId) -> Option<&AreaEntry> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    /// All areas in insertion order.
    #[must_use]
    pub fn list_areas(&self) -> &[AreaEntry] {
        &self.entries
    }

    /// Number of areas held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no areas are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of areas.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Analyzes a single area.
    ///
    /// # Errors
    ///
    /// * [`CoordinatorError::NotFound`] for an unknown id
    /// * [`CoordinatorError::InvalidState`] if the area is already
    ///   analyzing
    /// * [`CoordinatorError::Analysis`] if the run fails
    pub async fn analyze_one(
        &mut self,
        id: AreaId,
        config: &AnalysisConfig,
        progress: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<AnalysisResult, CoordinatorError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.id() == id)
            .ok_or(CoordinatorError::NotFound { id })?;

        if !entry.state().can_start() {
            return Err(AreaStateError {
                id,
                state: entry.state(),
                action: "start analysis",
            }
            .into());
        }

        Ok(self.engine.analyze(entry, config, progress, cancel).await?)
    }

    /// Analyzes every pending area one after another.
    ///
    /// Pending means [`AreaState::Created`] or [`AreaState::Failed`], plus
    /// [`AreaState::Analyzed`] when `force` is set. Outcomes are yielded in
    /// insertion order as each area finishes. Each area reports progress
    /// into its own slice of `progress`. Once `cancel` fires, the area in
    /// flight fails and the remaining areas are left untouched.
    pub fn analyze_all<'a>(
        &'a mut self,
        config: &'a AnalysisConfig,
        force: bool,
        progress: &'a dyn ProgressSink,
        cancel: &'a CancelFlag,
    ) -> impl Stream<Item = AreaOutcome> + 'a {
        async_stream::stream! {
            let pending: Vec<AreaId> = self
                .entries
                .iter()
                .filter(|entry| is_pending(entry.state(), force))
                .map(AreaEntry::id)
                .collect();

            log::info!("Analyzing {} of {} areas", pending.len(), self.entries.len());

            #[allow(clippy::cast_precision_loss)]
            let share = 100.0 / pending.len().max(1) as f64;

            for (index, id) in pending.into_iter().enumerate() {
                if index > 0 {
                    tokio::task::yield_now().await;
                }
                if cancel.is_cancelled() {
                    log::info!("Bulk analysis cancelled before area {id}");
                    break;
                }

                let Some(entry) = self.entries.iter_mut().find(|entry| entry.id() == id) else {
                    continue;
                };

                #[allow(clippy::cast_precision_loss)]
                let start = share * index as f64;
                let scaled = ScaledProgress::new(progress, start, start + share);

                let name = entry.name().to_string();
                let result = self
                    .engine
                    .analyze(entry, config, &scaled, cancel)
                    .await;

                if let Err(e) = &result {
                    log::warn!("Area {id} ({name}) failed: {e}");
                }

                yield AreaOutcome {
                    area_id: id,
                    name,
                    result,
                };
            }
        }
    }

    /// Runs [`Self::analyze_all`] to completion and collects the outcomes.
    pub async fn analyze_all_collect(
        &mut self,
        config: &AnalysisConfig,
        force: bool,
        progress: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Vec<AreaOutcome> {
        self.analyze_all(config, force, progress, cancel)
            .collect()
            .await
    }
}

const fn is_pending(state: AreaState, force: bool) -> bool {
    match state {
        AreaState::Created | AreaState::Failed => true,
        AreaState::Analyzed => force,
        AreaState::Analyzing => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoi_map_analysis::NullProgress;
    use aoi_map_layers::catalog;
    use aoi_map_layers_models::{Feature, ReferenceLayer};
    use geo::{Geometry, LineString, Point, Polygon};
    use std::sync::Mutex;

    fn square(x: f64, y: f64) -> Geometry<f64> {
        Geometry::Polygon(Polygon::new(
            LineString::from(vec![
                (x, y),
                (x + 0.01, y),
                (x + 0.01, y + 0.01),
                (x, y + 0.01),
                (x, y),
            ]),
            vec![],
        ))
    }

    fn upload(geometry: Geometry<f64>) -> FeatureCollection {
        std::iter::once(Feature::new(geometry)).collect()
    }

    fn registry() -> Arc<LayerRegistry> {
        let localidades = ReferenceLayer::new(
            catalog::find_definition("localidades").unwrap(),
            vec![
                Feature::new(Geometry::Point(Point::new(-99.005, 19.005)))
                    .with_property("POBTOT", 100),
                Feature::new(Geometry::Point(Point::new(-98.005, 19.005)))
                    .with_property("POBTOT", 40),
            ]
            .into_iter()
            .collect(),
        );
        Arc::new(std::iter::once(localidades).collect())
    }

    async fn run_all(coordinator: &mut AreaCoordinator, force: bool) -> Vec<AreaOutcome> {
        coordinator
            .analyze_all_collect(
                &AnalysisConfig::default(),
                force,
                &NullProgress,
                &CancelFlag::new(),
            )
            .await
    }

    #[test]
    fn capacity_is_enforced() {
        let mut coordinator = AreaCoordinator::with_capacity(registry(), 2);
        coordinator.add_area(&upload(square(0.0, 0.0)), "a").unwrap();
        coordinator.add_area(&upload(square(0.0, 0.0)), "b").unwrap();

        let err = coordinator
            .add_area(&upload(square(0.0, 0.0)), "c")
            .unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::CapacityExceeded { capacity: 2 }
        ));
        assert_eq!(coordinator.len(), 2);
    }

    #[test]
    fn default_capacity_is_ten() {
        let mut coordinator = AreaCoordinator::new(registry());
        for i in 0..DEFAULT_CAPACITY {
            coordinator
                .add_area(&upload(square(0.0, 0.0)), format!("area-{i}"))
                .unwrap();
        }
        let err = coordinator
            .add_area(&upload(square(0.0, 0.0)), "x")
            .unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::CapacityExceeded {
                capacity: DEFAULT_CAPACITY
            }
        ));

        assert_eq!(coordinator.len(), 10);
        let names: Vec<&str> = coordinator
            .list_areas()
            .iter()
            .map(AreaEntry::name)
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("area-{i}")).collect();
        assert_eq!(names, expected);
        assert!(
            coordinator
                .list_areas()
                .iter()
                .all(|entry| entry.state() == AreaState::Created)
        );
    }

    #[test]
    fn ids_are_not_reused() {
        let mut coordinator = AreaCoordinator::new(registry());
        let first = coordinator.add_area(&upload(square(0.0, 0.0)), "a").unwrap().id();
        assert!(coordinator.remove_area(first).is_some());
        assert!(coordinator.remove_area(first).is_none());

        let second = coordinator.add_area(&upload(square(0.0, 0.0)), "b").unwrap().id();
        assert!(second > first);
        assert!(coordinator.get(first).is_none());
        assert_eq!(coordinator.get(second).unwrap().name(), "b");

        coordinator.clear();
        assert!(coordinator.is_empty());
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let mut coordinator = AreaCoordinator::new(registry());
        coordinator
            .add_area(&upload(square(-99.01, 19.0)), "uno")
            .unwrap();
        coordinator
            .add_area(&upload(Geometry::Point(Point::new(0.0, 0.0))), "pozo")
            .unwrap();
        coordinator
            .add_area(&upload(square(-98.01, 19.0)), "tres")
            .unwrap();

        let outcomes = run_all(&mut coordinator, false).await;

        let names: Vec<&str> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["uno", "pozo", "tres"]);
        assert!(outcomes[0].is_success());
        let first_run = outcomes[0].result.as_ref().unwrap();
        assert_eq!(first_run.area_id, AreaId(1));
        assert_eq!(first_run.per_layer_results.matched_count("localidades"), 1);
        assert!(matches!(
            outcomes[1].result,
            Err(AnalysisError::MissingInput { .. })
        ));
        assert!(outcomes[2].is_success());

        let states: Vec<AreaState> = coordinator
            .list_areas()
            .iter()
            .map(AreaEntry::state)
            .collect();
        assert_eq!(
            states,
            vec![AreaState::Analyzed, AreaState::Failed, AreaState::Analyzed]
        );

        let first = coordinator.list_areas()[0].metrics().unwrap();
        assert_eq!(first.total_population, 100);
        let third = coordinator.list_areas()[2].metrics().unwrap();
        assert_eq!(third.total_population, 40);
    }

    #[tokio::test]
    async fn analyzed_areas_rerun_only_when_forced() {
        let mut coordinator = AreaCoordinator::new(registry());
        coordinator
            .add_area(&upload(square(-99.01, 19.0)), "uno")
            .unwrap();

        assert_eq!(run_all(&mut coordinator, false).await.len(), 1);
        assert!(run_all(&mut coordinator, false).await.is_empty());

        let forced = run_all(&mut coordinator, true).await;
        assert_eq!(forced.len(), 1);
        assert!(forced[0].is_success());
    }

    #[tokio::test]
    async fn outcomes_stream_as_areas_finish() {
        let mut coordinator = AreaCoordinator::new(registry());
        coordinator
            .add_area(&upload(square(-99.01, 19.0)), "uno")
            .unwrap();
        coordinator
            .add_area(&upload(square(-98.01, 19.0)), "dos")
            .unwrap();

        let config = AnalysisConfig::default();
        let cancel = CancelFlag::new();
        let stream = coordinator.analyze_all(&config, false, &NullProgress, &cancel);
        let mut stream = std::pin::pin!(stream);

        let first = stream.next().await.unwrap();
        assert_eq!(first.area_id, AreaId(1));
        let second = stream.next().await.unwrap();
        assert_eq!(second.area_id, AreaId(2));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_stops_remaining_areas() {
        let mut coordinator = AreaCoordinator::new(registry());
        coordinator
            .add_area(&upload(square(-99.01, 19.0)), "uno")
            .unwrap();
        coordinator
            .add_area(&upload(square(-98.01, 19.0)), "dos")
            .unwrap();

        let config = AnalysisConfig::default();
        let cancel = CancelFlag::new();
        let outcomes: Vec<AreaOutcome> = {
            let stream = coordinator.analyze_all(&config, false, &NullProgress, &cancel);
            let mut stream = std::pin::pin!(stream);
            let mut outcomes = Vec::new();
            while let Some(outcome) = stream.next().await {
                cancel.cancel();
                outcomes.push(outcome);
            }
            outcomes
        };

        assert_eq!(outcomes.len(), 1);
        assert_eq!(coordinator.list_areas()[0].state(), AreaState::Analyzed);
        assert_eq!(coordinator.list_areas()[1].state(), AreaState::Created);
    }

    #[tokio::test]
    async fn progress_spans_all_areas() {
        let mut coordinator = AreaCoordinator::new(registry());
        coordinator
            .add_area(&upload(square(-99.01, 19.0)), "uno")
            .unwrap();
        coordinator
            .add_area(&upload(square(-98.01, 19.0)), "dos")
            .unwrap();

        let seen = Mutex::new(Vec::new());
        let sink = |percent: f64, _: &str| seen.lock().unwrap().push(percent);
        coordinator
            .analyze_all_collect(&AnalysisConfig::default(), false, &sink, &CancelFlag::new())
            .await;

        let seen = seen.into_inner().unwrap();
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(seen.iter().any(|percent| (*percent - 50.0).abs() < 1e-9));
        assert!((seen.last().copied().unwrap() - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn analyze_one_reports_unknown_ids() {
        let mut coordinator = AreaCoordinator::new(registry());
        let err = coordinator
            .analyze_one(
                AreaId(42),
                &AnalysisConfig::default(),
                &NullProgress,
                &CancelFlag::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::NotFound { id: AreaId(42) }));

        let id = coordinator
            .add_area(&upload(square(-99.01, 19.0)), "uno")
            .unwrap()
            .id();
        let result = coordinator
            .analyze_one(id, &AnalysisConfig::default(), &NullProgress, &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(result.metrics.total_population, 100);
    }

    #[tokio::test]
    async fn list_order_ignores_analysis_order() {
        let mut coordinator = AreaCoordinator::new(registry());
        let ids: Vec<AreaId> = (0_u32..5)
            .map(|i| {
                let x = f64::from(i).mul_add(0.02, -99.05);
                coordinator
                    .add_area(&upload(square(x, 19.0)), format!("a{i}"))
                    .unwrap()
                    .id()
            })
            .collect();

        for index in [4, 2, 0, 3, 1] {
            coordinator
                .analyze_one(
                    ids[index],
                    &AnalysisConfig::default(),
                    &NullProgress,
                    &CancelFlag::new(),
                )
                .await
                .unwrap();
        }

        let names: Vec<&str> = coordinator
            .list_areas()
            .iter()
            .map(AreaEntry::name)
            .collect();
        assert_eq!(names, vec!["a0", "a1", "a2", "a3", "a4"]);

        let summary = aoi_map_report::project_summary(coordinator.list_areas());
        let rows: Vec<&str> = summary.rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(rows, vec!["a0", "a1", "a2", "a3", "a4"]);
    }
}
