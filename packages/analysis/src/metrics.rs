//! Aggregation of per-layer matches into [`AreaMetrics`].

use std::collections::{BTreeMap, BTreeSet};

use aoi_map_area_models::{AreaMetrics, LayerCount, LayerResult, LayerResults};
use aoi_map_layers::LayerRegistry;
use aoi_map_layers_models::{CountMode, Field, LayerDefinition};

/// Builds the metrics of one run.
///
/// Each processed layer contributes according to its definition's
/// [`aoi_map_layers_models::LayerMetrics`]. Layers that are no longer in
/// `registry` contribute their plain match count. Densities are zero when
/// `area_km2` is not a positive finite number.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn aggregate(
    area_km2: f64,
    perimeter_km: f64,
    results: &LayerResults,
    registry: &LayerRegistry,
    overlap_layers: &[String],
) -> AreaMetrics {
    let mut layer_counts = Vec::with_capacity(results.len());
    let mut total_elements = 0_u64;
    let mut population = 0.0_f64;
    let mut localities = 0_u64;

    for result in results {
        let definition = registry.get(&result.key).map(|layer| layer.definition.clone());
        let matched = result.features.len() as u64;

        let counted = definition
            .as_ref()
            .map_or(matched, |definition| counted_elements(definition, result));

        if let Some(definition) = &definition {
            if definition.metrics.population {
                population += population_of(definition, result);
            }
            if definition.metrics.localities {
                localities += matched;
            }
        }

        total_elements += counted;
        layer_counts.push(LayerCount {
            key: result.key.clone(),
            matched,
            counted,
        });
    }

    let total_population = round_population(population);
    let has_area = area_km2.is_finite() && area_km2 > 0.0;
    let density = |value: f64| if has_area { value / area_km2 } else { 0.0 };

    let overlap_flags: BTreeMap<String, bool> = overlap_layers
        .iter()
        .map(|key| (key.clone(), results.matched_count(key) > 0))
        .collect();

    AreaMetrics {
        area_km2,
        perimeter_km,
        total_elements,
        total_population,
        population_density: density(total_population as f64),
        locality_density: density(localities as f64),
        layer_counts,
        overlap_flags,
    }
}

fn counted_elements(definition: &LayerDefinition, result: &LayerResult) -> u64 {
    match definition.metrics.count {
        CountMode::Features => result.features.len() as u64,
        CountMode::DistinctPrimary => {
            let distinct: BTreeSet<String> = result
                .features
                .iter()
                .filter_map(|feature| feature.property_text(&definition.primary_property))
                .collect();
            distinct.len() as u64
        }
    }
}

fn population_of(definition: &LayerDefinition, result: &LayerResult) -> f64 {
    result
        .features
        .iter()
        .filter_map(|feature| {
            definition
                .fields
                .resolve_number(Field::Population, &feature.properties)
        })
        .filter(|value| value.is_finite() && *value > 0.0)
        .sum()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_population(population: f64) -> u64 {
    if population.is_finite() && population > 0.0 {
        population.round() as u64
    } else {
        0
    }
}
