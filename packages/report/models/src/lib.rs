#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report table types.
//!
//! These are plain row/column structures. Spreadsheet and PDF writers
//! consume them as-is; nothing here knows about geometry.

use serde::Serialize;

/// One area's line in the project summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    /// Area name, or `"Total"` for the total row.
    pub name: String,
    /// Clip area in km².
    pub area_km2: f64,
    /// Population of matched localities.
    pub population: u64,
    /// Sum of per-layer element counts.
    pub total_elements: u64,
    /// Population per km².
    pub population_density: f64,
}

/// Project summary: one row per analyzed area plus a total row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryTable {
    /// Area rows in input order.
    pub rows: Vec<SummaryRow>,
    /// Sums over `rows`, with the density recomputed from the sums.
    pub total: SummaryRow,
}

/// One matched feature in a layer detail table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDetailRow {
    /// Resolved display name of the feature.
    pub label: Option<String>,
    /// One cell per table column; `None` where the feature lacks the key.
    pub values: Vec<Option<String>>,
}

/// All matched features of one layer in one area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDetailTable {
    /// Area name.
    pub area: String,
    /// Layer key.
    pub layer_key: String,
    /// Human-readable layer name.
    pub layer_name: String,
    /// Union of property keys in first-seen order.
    pub columns: Vec<String>,
    /// One row per matched feature, in match order.
    pub rows: Vec<LayerDetailRow>,
}

/// One area's line in a [`MatrixTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow<T> {
    /// Area name.
    pub area: String,
    /// One value per table column.
    pub values: Vec<T>,
}

/// Areas × layers table (match counts, overlap flags).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixTable<T> {
    /// Layer keys.
    pub columns: Vec<String>,
    /// Area rows in input order.
    pub rows: Vec<MatrixRow<T>>,
}

impl<T> MatrixTable<T> {
    /// Looks up the value for `area` and `column`.
    #[must_use]
    pub fn value(&self, area: &str, column: &str) -> Option<&T> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .find(|row| row.area == area)
            .and_then(|row| row.values.get(index))
    }
}
