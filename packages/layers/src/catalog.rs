//! Compile-time catalog of reference layer definitions.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! Catalog order is the default registration order, which in turn fixes
//! the column and row order of every report.

use aoi_map_layers_models::LayerDefinition;

use crate::LayerError;

/// Number of catalogued layers. Enforced by a test.
#[cfg(test)]
const EXPECTED_LAYER_COUNT: usize = 9;

/// Embedded TOML layer definitions.
const LAYER_TOMLS: &[(&str, &str)] = &[
    ("localidades", include_str!("../catalog/localidades.toml")),
    (
        "pueblos_indigenas",
        include_str!("../catalog/pueblos_indigenas.toml"),
    ),
    ("lenguas", include_str!("../catalog/lenguas.toml")),
    ("municipios", include_str!("../catalog/municipios.toml")),
    ("anp", include_str!("../catalog/anp.toml")),
    ("ramsar", include_str!("../catalog/ramsar.toml")),
    (
        "zonas_historicas",
        include_str!("../catalog/zonas_historicas.toml"),
    ),
    (
        "zonas_arqueologicas",
        include_str!("../catalog/zonas_arqueologicas.toml"),
    ),
    (
        "nucleos_agrarios",
        include_str!("../catalog/nucleos_agrarios.toml"),
    ),
];

/// Returns all catalogued layer definitions in catalog order.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse. Since these are
/// compile-time constants, parse failures indicate a development error
/// and are caught by the tests below.
#[must_use]
pub fn all_definitions() -> Vec<LayerDefinition> {
    LAYER_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse layer definition '{name}': {e}"))
        })
        .collect()
}

/// Looks up a single catalogued definition by key.
///
/// # Errors
///
/// Returns [`LayerError::UnknownLayer`] if no definition has that key.
pub fn find_definition(key: &str) -> Result<LayerDefinition, LayerError> {
    all_definitions()
        .into_iter()
        .find(|definition| definition.key == key)
        .ok_or_else(|| LayerError::UnknownLayer {
            key: key.to_string(),
        })
}

/// Keys of the layers whose matches raise an overlap flag.
#[must_use]
pub fn overlap_layer_keys() -> Vec<String> {
    all_definitions()
        .into_iter()
        .filter(|definition| definition.metrics.overlap_flag)
        .map(|definition| definition.key)
        .collect()
}
