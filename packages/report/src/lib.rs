#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Read-only projections of analyzed areas into report tables.
//!
//! Only [`AreaState::Analyzed`](aoi_map_area_models::AreaState::Analyzed)
//! entries carry results, so every projection skips or rejects the rest.
//! [`csv`] renders the tables.

pub mod csv;

use std::collections::BTreeSet;

use aoi_map_area_models::AreaEntry;
use aoi_map_layers::LayerRegistry;
use aoi_map_layers_models::{Feature, Field};
use aoi_map_report_models::{
    LayerDetailRow, LayerDetailTable, MatrixRow, MatrixTable, SummaryRow, SummaryTable,
};
use serde_json::Value;
use thiserror::Error;

/// Label of the summary's total row.
pub const TOTAL_ROW_NAME: &str = "Total";

/// Errors that can occur while projecting or rendering a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The area has no valid results.
    #[error("Area '{area}' has not been analyzed")]
    NotAnalyzed {
        /// Area name.
        area: String,
    },

    /// The layer was not part of the area's last run.
    #[error("Layer '{key}' was not processed for area '{area}'")]
    LayerNotProcessed {
        /// Area name.
        area: String,
        /// Requested layer key.
        key: String,
    },

    /// Writing CSV failed.
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the project summary from the analyzed entries, in input order.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn project_summary<'a>(entries: impl IntoIterator<Item = &'a AreaEntry>) -> SummaryTable {
    let rows: Vec<SummaryRow> = entries
        .into_iter()
        .filter_map(|entry| {
            entry.metrics().map(|metrics| SummaryRow {
                name: entry.name().to_string(),
                area_km2: metrics.area_km2,
                population: metrics.total_population,
                total_elements: metrics.total_elements,
                population_density: metrics.population_density,
            })
        })
        .collect();

    let area_km2: f64 = rows.iter().map(|row| row.area_km2).sum();
    let population: u64 = rows.iter().map(|row| row.population).sum();
    let total_elements: u64 = rows.iter().map(|row| row.total_elements).sum();
    let population_density = if area_km2 > 0.0 {
        population as f64 / area_km2
    } else {
        0.0
    };

    SummaryTable {
        rows,
        total: SummaryRow {
            name: TOTAL_ROW_NAME.to_string(),
            area_km2,
            population,
            total_elements,
            population_density,
        },
    }
}

/// Lists the features `entry` matched in layer `key`.
///
/// Columns are the union of the matched features' property keys in
/// first-seen order. Labels come from the layer's name field candidates,
/// falling back to its primary property.
///
/// # Errors
///
/// * [`ReportError::NotAnalyzed`] if the entry is not analyzed
/// * [`ReportError::LayerNotProcessed`] if `key` was not part of the run
pub fn project_layer_detail(
    entry: &AreaEntry,
    registry: &LayerRegistry,
    key: &str,
) -> Result<LayerDetailTable, ReportError> {
    let results = entry.results().ok_or_else(|| ReportError::NotAnalyzed {
        area: entry.name().to_string(),
    })?;
    let result = results
        .result(key)
        .ok_or_else(|| ReportError::LayerNotProcessed {
            area: entry.name().to_string(),
            key: key.to_string(),
        })?;

    let layer = registry.get(key);
    if layer.is_none() {
        log::debug!("{key}: not registered, detail rows have no labels");
    }

    let mut columns: Vec<String> = Vec::new();
    for feature in &result.features {
        for property in feature.properties.keys() {
            if !columns.contains(property) {
                columns.push(property.clone());
            }
        }
    }

    let rows = result
        .features
        .iter()
        .map(|feature| LayerDetailRow {
            label: layer.as_ref().and_then(|layer| {
                layer
                    .definition
                    .fields
                    .resolve_text(Field::Name, &feature.properties)
                    .or_else(|| feature.property_text(layer.primary_property()))
            }),
            values: columns
                .iter()
                .map(|column| cell(feature, column))
                .collect(),
        })
        .collect();

    Ok(LayerDetailTable {
        area: entry.name().to_string(),
        layer_key: key.to_string(),
        layer_name: layer.map_or_else(|| key.to_string(), |layer| layer.display_name().to_string()),
        columns,
        rows,
    })
}

/// Matched feature counts per analyzed area and layer.
#[must_use]
pub fn project_layer_counts<'a>(
    entries: impl IntoIterator<Item = &'a AreaEntry>,
    keys: &[&str],
) -> MatrixTable<u64> {
    let rows = entries
        .into_iter()
        .filter_map(|entry| {
            entry.results().map(|results| MatrixRow {
                area: entry.name().to_string(),
                values: keys
                    .iter()
                    .map(|key| results.matched_count(key) as u64)
                    .collect(),
            })
        })
        .collect();

    MatrixTable {
        columns: keys.iter().map(ToString::to_string).collect(),
        rows,
    }
}

/// Overlap flags per analyzed area. Columns are every flagged layer key,
/// sorted; an area without a flag for a column reads `false`.
#[must_use]
pub fn project_overlaps<'a>(
    entries: impl IntoIterator<Item = &'a AreaEntry> + Clone,
) -> MatrixTable<bool> {
    let columns: Vec<String> = entries
        .clone()
        .into_iter()
        .filter_map(AreaEntry::metrics)
        .flat_map(|metrics| metrics.overlap_flags.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let rows = entries
        .into_iter()
        .filter_map(|entry| {
            entry.metrics().map(|metrics| MatrixRow {
                area: entry.name().to_string(),
                values: columns
                    .iter()
                    .map(|key| metrics.overlap_flags.get(key).copied().unwrap_or(false))
                    .collect(),
            })
        })
        .collect();

    MatrixTable { columns, rows }
}

fn cell(feature: &Feature, column: &str) -> Option<String> {
    match feature.property(column)? {
        Value::Null => None,
        value @ (Value::Array(_) | Value::Object(_)) => Some(value.to_string()),
        Value::String(s) => Some(s.clone()),
        value => aoi_map_layers_models::value_text(value),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use aoi_map_area_models::{AreaId, AreaMetrics, AreaType, LayerResult, LayerResults};
    use aoi_map_layers::catalog;
    use aoi_map_layers_models::{FeatureCollection, ReferenceLayer};
    use geo::{Geometry, LineString, Point, Polygon};
    use std::collections::BTreeMap;

    fn square() -> Geometry<f64> {
        Geometry::Polygon(Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]),
            vec![],
        ))
    }

    pub(crate) fn localidad(name: &str, population: u64) -> Feature {
        Feature::new(Geometry::Point(Point::new(0.5, 0.5)))
            .with_property("NOMGEO", name)
            .with_property("POBTOT", population)
    }

    pub(crate) fn analyzed(
        id: u64,
        name: &str,
        area_km2: f64,
        population: u64,
        features: Vec<Feature>,
    ) -> AreaEntry {
        let upload: FeatureCollection = std::iter::once(Feature::new(square())).collect();
        let mut entry = AreaEntry::new(AreaId(id), name, &upload);

        let mut results = LayerResults::new();
        results.push(LayerResult {
            key: "localidades".to_string(),
            features: features.into_iter().collect(),
            skipped: false,
        });
        #[allow(clippy::cast_precision_loss)]
        let metrics = AreaMetrics {
            area_km2,
            perimeter_km: 4.0,
            total_elements: results.matched_count("localidades") as u64,
            total_population: population,
            population_density: population as f64 / area_km2,
            locality_density: 0.0,
            layer_counts: Vec::new(),
            overlap_flags: BTreeMap::from([("anp".to_string(), id % 2 == 0)]),
        };

        entry.begin_analysis(AreaType::Exact, None).unwrap();
        entry.complete(square(), results, metrics).unwrap();
        entry
    }

    pub(crate) fn registry() -> LayerRegistry {
        std::iter::once(ReferenceLayer::new(
            catalog::find_definition("localidades").unwrap(),
            FeatureCollection::new(),
        ))
        .collect()
    }

    #[test]
    fn summary_includes_only_analyzed_areas_with_totals() {
        let upload: FeatureCollection = std::iter::once(Feature::new(square())).collect();
        let pending = AreaEntry::new(AreaId(9), "pendiente", &upload);
        let entries = vec![
            analyzed(1, "norte", 2.0, 100, vec![localidad("A", 100)]),
            pending,
            analyzed(2, "sur", 3.0, 400, vec![localidad("B", 150), localidad("C", 250)]),
        ];

        let summary = project_summary(&entries);

        let names: Vec<&str> = summary.rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["norte", "sur"]);
        assert_eq!(summary.total.name, TOTAL_ROW_NAME);
        assert!((summary.total.area_km2 - 5.0).abs() < 1e-9);
        assert_eq!(summary.total.population, 500);
        assert_eq!(summary.total.total_elements, 3);
        assert!((summary.total.population_density - 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_summary_has_zero_density() {
        let summary = project_summary(&Vec::<AreaEntry>::new());
        assert!(summary.rows.is_empty());
        assert!(summary.total.population_density.abs() < f64::EPSILON);
    }

    #[test]
    fn layer_detail_unions_columns_in_first_seen_order() {
        let entry = analyzed(
            1,
            "norte",
            1.0,
            0,
            vec![
                Feature::new(Geometry::Point(Point::new(0.5, 0.5)))
                    .with_property("NOM_LOC", "Uno")
                    .with_property("POBTOT", 10),
                Feature::new(Geometry::Point(Point::new(0.5, 0.5)))
                    .with_property("NOMGEO", "Dos")
                    .with_property("AMBITO", "Rural"),
            ],
        );

        let table = project_layer_detail(&entry, &registry(), "localidades").unwrap();

        assert_eq!(table.layer_name, "Localidades (INEGI)");
        assert_eq!(table.columns.len(), 4);
        assert!(table.columns.contains(&"AMBITO".to_string()));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].label.as_deref(), Some("Uno"));
        assert_eq!(table.rows[1].label.as_deref(), Some("Dos"));

        let ambito = table.columns.iter().position(|c| c == "AMBITO").unwrap();
        assert_eq!(table.rows[0].values[ambito], None);
        assert_eq!(table.rows[1].values[ambito].as_deref(), Some("Rural"));
    }

    #[test]
    fn layer_detail_errors() {
        let upload: FeatureCollection = std::iter::once(Feature::new(square())).collect();
        let pending = AreaEntry::new(AreaId(3), "pendiente", &upload);
        assert!(matches!(
            project_layer_detail(&pending, &registry(), "localidades"),
            Err(ReportError::NotAnalyzed { .. })
        ));

        let entry = analyzed(1, "norte", 1.0, 0, Vec::new());
        assert!(matches!(
            project_layer_detail(&entry, &registry(), "ramsar"),
            Err(ReportError::LayerNotProcessed { .. })
        ));
    }

    #[test]
    fn matrices() {
        let entries = vec![
            analyzed(1, "norte", 1.0, 0, vec![localidad("A", 1)]),
            analyzed(2, "sur", 1.0, 0, vec![localidad("B", 1), localidad("C", 1)]),
        ];

        let counts = project_layer_counts(&entries, &["localidades", "ramsar"]);
        assert_eq!(counts.value("norte", "localidades"), Some(&1));
        assert_eq!(counts.value("sur", "localidades"), Some(&2));
        assert_eq!(counts.value("sur", "ramsar"), Some(&0));

        let overlaps = project_overlaps(&entries);
        assert_eq!(overlaps.columns, vec!["anp"]);
        assert_eq!(overlaps.value("norte", "anp"), Some(&false));
        assert_eq!(overlaps.value("sur", "anp"), Some(&true));
    }
}
