//! asgs-geoclass - Geocode location names and classify them into ASGS regions
//!
//! This library provides the geocoding client, boundary layer loading and
//! the spatial classifier used by the `geoclassify` binary.

pub mod config;
pub mod geocoder;
pub mod models;
pub mod pip;
pub mod pipeline;
pub mod resume;

pub use config::Settings;
pub use models::{ClassificationRecord, GeocodeResult, LayerKey, PointQuery};
pub use pipeline::Pipeline;
