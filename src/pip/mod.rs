//! Point-in-Polygon (PIP) classification against ASGS boundary layers.
//!
//! Layers are loaded from GeoJSON, normalized to WGS84 and indexed in an
//! R-tree for fast lookups.

pub mod crs;
mod index;
mod loader;
mod schema;
mod service;
mod summary;

pub use crs::{Crs, Reprojection, WGS84};
pub use index::{BoundaryFeature, BoundaryLayer, LayerMatch};
pub use loader::{load_layer, load_layer_with_schema, LayerLoadError};
pub use schema::{ColumnSpec, LayerSchema};
pub use service::Classifier;
pub use summary::{ClassificationSummary, GeocodeCheck, LayerTally, DEFAULT_MIN_SUCCESS_RATE};
