#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pure geometry primitives for area-of-interest clipping.
//!
//! Every operation here is side-effect free and deterministic: the same
//! input always produces the same output. Inputs are WGS84 longitude /
//! latitude geometries; areas and lengths are reported in kilometres
//! using geodesic measurements, and buffers are built in a local
//! kilometre plane centred on the input before being mapped back.

use geo::{
    Buffer, Centroid, Coord, CoordsIter, GeodesicArea, Geometry, Intersects, MapCoords,
    MultiPolygon,
};
use strum_macros::Display;
use thiserror::Error;

/// Kilometres per degree of latitude.
pub const KM_PER_DEGREE_LAT: f64 = 110.574;

/// Kilometres per degree of longitude at the equator.
pub const KM_PER_DEGREE_LON: f64 = 111.320;

/// The primitive operation that rejected its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    /// [`intersects`]
    Intersects,
    /// [`area_km2`]
    Area,
    /// [`length_km`]
    Length,
    /// [`buffer_km`]
    Buffer,
}

/// Errors raised when a primitive receives degenerate input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// Polygonal input without any usable ring.
    #[error("{operation}: geometry has no rings")]
    Empty {
        /// Operation that failed.
        operation: Operation,
    },

    /// The operation only accepts `Polygon` / `MultiPolygon` input.
    #[error("{operation}: expected a Polygon or MultiPolygon, got {kind}")]
    NotPolygonal {
        /// Operation that failed.
        operation: Operation,
        /// Geometry type that was supplied.
        kind: &'static str,
    },

    /// A coordinate is NaN or infinite.
    #[error("{operation}: geometry contains non-finite coordinates")]
    NonFinite {
        /// Operation that failed.
        operation: Operation,
    },

    /// Buffer radius is negative or not a finite number.
    #[error("buffer radius must be a finite, non-negative distance in km (got {radius_km})")]
    InvalidRadius {
        /// Radius that was supplied.
        radius_km: f64,
    },
}

/// Returns the `GeoJSON` type name of a geometry.
#[must_use]
pub const fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Whether the geometry is a `Polygon` or `MultiPolygon`.
#[must_use]
pub const fn is_polygonal(geometry: &Geometry<f64>) -> bool {
    matches!(geometry, Geometry::Polygon(_) | Geometry::MultiPolygon(_))
}

/// Tests whether two geometries share at least one point.
///
/// # Errors
///
/// Returns [`GeometryError::NonFinite`] if either geometry carries NaN or
/// infinite coordinates.
pub fn intersects(a: &Geometry<f64>, b: &Geometry<f64>) -> Result<bool, GeometryError> {
    if !is_finite(a) || !is_finite(b) {
        return Err(GeometryError::NonFinite {
            operation: Operation::Intersects,
        });
    }

    Ok(a.intersects(b))
}

/// Geodesic area of a polygonal geometry in square kilometres.
///
/// # Errors
///
/// Returns [`GeometryError`] if the geometry is not polygonal, has no
/// rings, or has non-finite coordinates.
pub fn area_km2(geometry: &Geometry<f64>) -> Result<f64, GeometryError> {
    let polygons = polygonal(geometry, Operation::Area)?;
    Ok(polygons.geodesic_area_unsigned() / 1_000_000.0)
}

/// Geodesic perimeter of a polygonal geometry in kilometres, interior
/// rings included.
///
/// # Errors
///
/// Returns [`GeometryError`] if the geometry is not polygonal, has no
/// rings, or has non-finite coordinates.
pub fn length_km(geometry: &Geometry<f64>) -> Result<f64, GeometryError> {
    let polygons = polygonal(geometry, Operation::Length)?;
    Ok(polygons.geodesic_perimeter() / 1_000.0)
}

/// Expands a polygonal geometry outward by `radius_km`.
///
/// The buffer is computed in a local equirectangular plane (kilometre
/// units) centred on the input's centroid, with round joins, and mapped
/// back to longitude / latitude. A zero radius returns the input as a
/// `MultiPolygon`.
///
/// # Errors
///
/// Returns [`GeometryError::InvalidRadius`] for negative or non-finite
/// radii, and the usual polygonal-input errors otherwise.
pub fn buffer_km(geometry: &Geometry<f64>, radius_km: f64) -> Result<Geometry<f64>, GeometryError> {
    if !radius_km.is_finite() || radius_km < 0.0 {
        return Err(GeometryError::InvalidRadius { radius_km });
    }

    let polygons = polygonal(geometry, Operation::Buffer)?;
    if radius_km <= 0.0 {
        return Ok(Geometry::MultiPolygon(polygons));
    }

    let plane = LocalPlane::centred_on(&polygons).ok_or(GeometryError::Empty {
        operation: Operation::Buffer,
    })?;

    let local = polygons.map_coords(move |coord| plane.to_local(coord));
    let buffered = local.buffer(radius_km);

    if buffered.0.is_empty() {
        return Err(GeometryError::Empty {
            operation: Operation::Buffer,
        });
    }

    log::trace!(
        "Buffered {} polygon(s) by {radius_km} km into {} polygon(s)",
        polygons.0.len(),
        buffered.0.len()
    );

    Ok(Geometry::MultiPolygon(
        buffered.map_coords(move |coord| plane.to_lon_lat(coord)),
    ))
}

/// Normalizes polygonal input into a [`MultiPolygon`], dropping polygons
/// whose exterior ring is empty.
fn polygonal(
    geometry: &Geometry<f64>,
    operation: Operation,
) -> Result<MultiPolygon<f64>, GeometryError> {
    let polygons = match geometry {
        Geometry::Polygon(polygon) => vec![polygon.clone()],
        Geometry::MultiPolygon(multi) => multi.0.clone(),
        other => {
            return Err(GeometryError::NotPolygonal {
                operation,
                kind: geometry_kind(other),
            });
        }
    };

    let polygons: Vec<_> = polygons
        .into_iter()
        .filter(|polygon| !polygon.exterior().0.is_empty())
        .collect();

    if polygons.is_empty() {
        return Err(GeometryError::Empty { operation });
    }

    let multi = MultiPolygon::new(polygons);
    if !is_finite_coords(&multi) {
        return Err(GeometryError::NonFinite { operation });
    }

    Ok(multi)
}

fn is_finite(geometry: &Geometry<f64>) -> bool {
    geometry
        .coords_iter()
        .all(|coord| coord.x.is_finite() && coord.y.is_finite())
}

fn is_finite_coords(polygons: &MultiPolygon<f64>) -> bool {
    polygons
        .coords_iter()
        .all(|coord| coord.x.is_finite() && coord.y.is_finite())
}

/// Equirectangular kilometre plane around an origin.
#[derive(Debug, Clone, Copy)]
struct LocalPlane {
    origin_lon: f64,
    origin_lat: f64,
    km_per_degree_lon: f64,
}

impl LocalPlane {
    fn centred_on(polygons: &MultiPolygon<f64>) -> Option<Self> {
        let centre = polygons.centroid()?;
        Some(Self {
            origin_lon: centre.x(),
            origin_lat: centre.y(),
            km_per_degree_lon: KM_PER_DEGREE_LON * centre.y().to_radians().cos(),
        })
    }

    fn to_local(self, coord: Coord<f64>) -> Coord<f64> {
        Coord {
            x: (coord.x - self.origin_lon) * self.km_per_degree_lon,
            y: (coord.y - self.origin_lat) * KM_PER_DEGREE_LAT,
        }
    }

    fn to_lon_lat(self, coord: Coord<f64>) -> Coord<f64> {
        Coord {
            x: coord.x / self.km_per_degree_lon + self.origin_lon,
            y: coord.y / KM_PER_DEGREE_LAT + self.origin_lat,
        }
    }
}
