//! Builds [`ReferenceLayer`]s from `GeoJSON` text.
//!
//! Fetching the text (network, retries, proxies) belongs to the caller.
//! This module only parses, and for local use reads one
//! `<key>.geojson` file per catalogued layer from a directory.

use std::path::Path;

use aoi_map_layers_models::{FeatureCollection, LayerDefinition, ReferenceLayer};

use crate::{LayerError, LayerRegistry};

/// Parses a `GeoJSON` document into a feature collection.
///
/// # Errors
///
/// Returns [`LayerError::GeoJson`] if the text is not valid `GeoJSON`.
pub fn parse_feature_collection(json: &str) -> Result<FeatureCollection, LayerError> {
    Ok(FeatureCollection::parse(json)?)
}

/// Parses `GeoJSON` text into a layer described by `definition`.
///
/// # Errors
///
/// Returns [`LayerError::GeoJson`] if the text is not valid `GeoJSON`.
pub fn load_layer(definition: LayerDefinition, json: &str) -> Result<ReferenceLayer, LayerError> {
    let features = parse_feature_collection(json)?;

    let without_geometry = features
        .iter()
        .filter(|feature| feature.geometry.is_none())
        .count();
    if without_geometry > 0 {
        log::warn!(
            "{}: {without_geometry} of {} features have no geometry and will never match",
            definition.key,
            features.len()
        );
    }

    log::info!(
        "{}: loaded {} features ({})",
        definition.key,
        features.len(),
        definition.display_name
    );

    Ok(ReferenceLayer::new(definition, features))
}

/// Reads and parses a single layer file.
///
/// # Errors
///
/// Returns [`LayerError`] if the file cannot be read or parsed.
pub async fn load_file(
    definition: LayerDefinition,
    path: &Path,
) -> Result<ReferenceLayer, LayerError> {
    let json = tokio::fs::read_to_string(path).await?;
    load_layer(definition, &json)
}

/// Loads `<dir>/<key>.geojson` for every definition, in definition order.
///
/// Missing or unparseable files are logged and skipped: analyses treat an
/// absent layer as contributing nothing, so partial reference data still
/// yields a usable registry.
///
/// # Errors
///
/// Returns [`LayerError::Io`] if `dir` itself cannot be read.
pub async fn load_directory(
    dir: &Path,
    definitions: Vec<LayerDefinition>,
) -> Result<LayerRegistry, LayerError> {
    tokio::fs::metadata(dir).await?;

    let mut registry = LayerRegistry::new();

    for definition in definitions {
        let path = dir.join(format!("{}.geojson", definition.key));
        let key = definition.key.clone();

        match load_file(definition, &path).await {
            Ok(layer) => {
                registry.register(layer);
            }
            Err(LayerError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("{key}: no layer file at {}, skipping", path.display());
            }
            Err(e) => {
                log::warn!("{key}: failed to load {}: {e}", path.display());
            }
        }
    }

    log::info!(
        "Loaded {} reference layers from {}",
        registry.len(),
        dir.display()
    );

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCALITIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"NOMGEO": "Uno", "POBTOT": 10},
             "geometry": {"type": "Point", "coordinates": [-99.1, 19.4]}},
            {"type": "Feature", "properties": {"NOMGEO": "Dos", "POBTOT": 20},
             "geometry": {"type": "Point", "coordinates": [-99.2, 19.5]}}
        ]
    }"#;

    #[test]
    fn loads_layer_from_geojson() {
        let definition = LayerDefinition::new("localidades", "Localidades", "NOMGEO");
        let layer = load_layer(definition, LOCALITIES).unwrap();

        assert_eq!(layer.key(), "localidades");
        assert_eq!(layer.features.len(), 2);
        assert_eq!(layer.features.features[1].property_text("NOMGEO").unwrap(), "Dos");
    }

    #[test]
    fn rejects_malformed_geojson() {
        let definition = LayerDefinition::new("anp", "ANP", "NOMBRE");
        assert!(matches!(
            load_layer(definition, "{ not json"),
            Err(LayerError::GeoJson(_))
        ));
    }

    #[tokio::test]
    async fn directory_load_skips_missing_files() {
        let tmp = std::env::temp_dir().join("aoi_map_layers_test_dir");
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();
        std::fs::write(tmp.join("localidades.geojson"), LOCALITIES).unwrap();
        std::fs::write(tmp.join("anp.geojson"), "garbage").unwrap();

        let registry = load_directory(
            &tmp,
            vec![
                LayerDefinition::new("localidades", "Localidades", "NOMGEO"),
                LayerDefinition::new("anp", "ANP", "NOMBRE"),
                LayerDefinition::new("ramsar", "Ramsar", "RAMSAR"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(registry.list_keys(), vec!["localidades"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn directory_load_fails_for_missing_directory() {
        let missing = std::env::temp_dir().join("aoi_map_layers_test_missing_dir");
        let _ = std::fs::remove_dir_all(&missing);

        assert!(matches!(
            load_directory(&missing, Vec::new()).await,
            Err(LayerError::Io(_))
        ));
    }
}
