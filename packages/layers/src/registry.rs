//! In-memory registry of loaded reference layers.
//!
//! Layers are kept in registration order, which is the order the analysis
//! engine walks them and the order reports lay them out. Each layer sits
//! behind an [`Arc`] so that replacing a key swaps the whole layer at
//! once: a holder of the previous layer keeps a consistent snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use aoi_map_layers_models::ReferenceLayer;

/// Named reference layers, in registration order.
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    layers: Vec<Arc<ReferenceLayer>>,
    /// layer key -> position in `layers`
    index: BTreeMap<String, usize>,
}

impl LayerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer, or replaces the layer registered under the same key.
    ///
    /// A replaced layer keeps its original position. Returns the layer
    /// that was replaced, if any.
    pub fn register(&mut self, layer: ReferenceLayer) -> Option<Arc<ReferenceLayer>> {
        let layer = Arc::new(layer);

        if let Some(&position) = self.index.get(layer.key()) {
            log::debug!("Replacing reference layer {}", layer.key());
            return Some(std::mem::replace(&mut self.layers[position], layer));
        }

        log::debug!(
            "Registering reference layer {} ({} features)",
            layer.key(),
            layer.features.len()
        );
        self.index.insert(layer.key().to_string(), self.layers.len());
        self.layers.push(layer);
        None
    }

    /// Looks up a layer by key. A missing layer is not an error.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<ReferenceLayer>> {
        self.index
            .get(key)
            .map(|&position| Arc::clone(&self.layers[position]))
    }

    /// Whether a layer is registered under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Layer keys in registration order.
    #[must_use]
    pub fn list_keys(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.key()).collect()
    }

    /// Iterates layers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ReferenceLayer> {
        self.layers.iter().map(Arc::as_ref)
    }

    /// Number of registered layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether no layers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl FromIterator<ReferenceLayer> for LayerRegistry {
    fn from_iter<I: IntoIterator<Item = ReferenceLayer>>(iter: I) -> Self {
        let mut registry = Self::new();
        for layer in iter {
            registry.register(layer);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoi_map_layers_models::{Feature, FeatureCollection, LayerDefinition};
    use geo::{Geometry, Point};

    fn layer(key: &str, features: usize) -> ReferenceLayer {
        ReferenceLayer::new(
            LayerDefinition::new(key, key.to_uppercase(), "NOMBRE"),
            (0..features)
                .map(|i| Feature::new(Geometry::Point(Point::new(0.0, 0.0))).with_property("id", i))
                .collect::<FeatureCollection>(),
        )
    }

    #[test]
    fn keys_follow_registration_order() {
        let mut registry = LayerRegistry::new();
        registry.register(layer("ramsar", 1));
        registry.register(layer("anp", 2));
        registry.register(layer("localidades", 3));

        assert_eq!(registry.list_keys(), vec!["ramsar", "anp", "localidades"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn replacing_keeps_position_and_swaps_features() {
        let mut registry: LayerRegistry = [layer("a", 1), layer("b", 1)].into_iter().collect();
        let before = registry.get("a").unwrap();

        let replaced = registry.register(layer("a", 5));

        assert_eq!(replaced.unwrap().features.len(), 1);
        assert_eq!(registry.list_keys(), vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().features.len(), 5);
        // Earlier snapshot is untouched.
        assert_eq!(before.features.len(), 1);
    }

    #[test]
    fn registering_twice_is_idempotent() {
        let mut registry = LayerRegistry::new();
        registry.register(layer("a", 2));
        registry.register(layer("a", 2));

        assert_eq!(registry.len(), 1);
        assert_eq!(*registry.get("a").unwrap(), layer("a", 2));
    }

    #[test]
    fn missing_layer_is_none() {
        let registry = LayerRegistry::new();
        assert!(registry.get("ramsar").is_none());
        assert!(!registry.contains("ramsar"));
        assert!(registry.is_empty());
    }
}
