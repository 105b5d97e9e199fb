//! Features and feature collections.
//!
//! Thin owned wrappers over `geo` geometries plus the raw `GeoJSON`
//! property bag. Property keys are left exactly as the source dataset
//! wrote them.

use geo::Geometry;
use geojson::GeoJson;
use serde_json::Value;

/// Property bag of a feature, keyed by the dataset's own field names.
pub type Properties = serde_json::Map<String, Value>;

/// A single geometry with its properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Geometry, or `None` for features with a `null` geometry.
    pub geometry: Option<Geometry<f64>>,
    /// Raw properties.
    pub properties: Properties,
}

impl Feature {
    /// Creates a feature with no properties.
    #[must_use]
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: Properties::new(),
        }
    }

    /// Adds a property, replacing any previous value under `key`.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Looks up a raw property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Looks up a property rendered as text (see [`value_text`]).
    #[must_use]
    pub fn property_text(&self, key: &str) -> Option<String> {
        self.property(key).and_then(value_text)
    }

    /// Whether the geometry is a `Polygon` or `MultiPolygon`.
    #[must_use]
    pub const fn is_polygonal(&self) -> bool {
        matches!(
            self.geometry,
            Some(Geometry::Polygon(_) | Geometry::MultiPolygon(_))
        )
    }

    /// Converts back into a `GeoJSON` feature for map renderers.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::Feature {
        geojson::Feature {
            bbox: None,
            geometry: self
                .geometry
                .as_ref()
                .map(|geometry| geojson::Geometry::new(geojson::Value::from(geometry))),
            id: None,
            properties: Some(self.properties.clone()),
            foreign_members: None,
        }
    }
}

impl TryFrom<geojson::Feature> for Feature {
    type Error = geojson::Error;

    fn try_from(feature: geojson::Feature) -> Result<Self, Self::Error> {
        let geometry = feature.geometry.map(Geometry::try_from).transpose()?;
        Ok(Self {
            geometry,
            properties: feature.properties.unwrap_or_default(),
        })
    }
}

/// Ordered sequence of features. Order is preserved end to end so that
/// reports are reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    /// Features in source order.
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    /// Parses a `GeoJSON` document: a `FeatureCollection`, a single
    /// `Feature`, or a bare geometry.
    ///
    /// # Errors
    ///
    /// Returns [`geojson::Error`] if the text is not valid `GeoJSON` or a
    /// geometry cannot be converted.
    pub fn parse(json: &str) -> Result<Self, geojson::Error> {
        let geojson: GeoJson = json.parse()?;
        Self::try_from(geojson)
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection has no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterates features in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Appends a feature.
    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    /// Converts back into a `GeoJSON` feature collection.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.features.iter().map(Feature::to_geojson).collect(),
            foreign_members: None,
        }
    }
}

impl TryFrom<GeoJson> for FeatureCollection {
    type Error = geojson::Error;

    fn try_from(geojson: GeoJson) -> Result<Self, Self::Error> {
        match geojson {
            GeoJson::FeatureCollection(collection) => collection
                .features
                .into_iter()
                .map(Feature::try_from)
                .collect(),
            GeoJson::Feature(feature) => Ok(Self {
                features: vec![Feature::try_from(feature)?],
            }),
            GeoJson::Geometry(geometry) => Ok(Self {
                features: vec![Feature::new(Geometry::try_from(geometry)?)],
            }),
        }
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

/// Renders a scalar property as text.
///
/// Strings are trimmed (empty strings yield `None`), numbers and booleans
/// use their JSON spelling. Arrays, objects, and `null` yield `None`.
#[must_use]
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Reads a scalar property as a number. Numeric strings (optionally with
/// thousands separators) are accepted since several datasets store counts
/// as text.
#[must_use]
pub fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
}
