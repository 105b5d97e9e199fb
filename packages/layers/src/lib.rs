#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reference layer registry and loading.
//!
//! Layer metadata is defined as TOML files embedded at compile time (see
//! [`catalog`]). Feature data is supplied by an external loader and
//! parsed from `GeoJSON` text with [`load`]; the resulting layers are held
//! in a [`LayerRegistry`] that stays read-only while analyses run.

pub mod catalog;
pub mod load;
pub mod registry;

pub use registry::LayerRegistry;

use thiserror::Error;

/// Errors that can occur while loading reference layers.
#[derive(Debug, Error)]
pub enum LayerError {
    /// Reading a layer file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The layer text is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// No catalog entry exists for the requested key.
    #[error("Unknown layer: {key}")]
    UnknownLayer {
        /// The requested layer key.
        key: String,
    },
}
