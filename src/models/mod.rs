//! Core data models shared by the geocoder and the classifier.

pub mod layer;
pub mod location;
pub mod region;

pub use layer::{LayerKey, UnknownLayerKey};
pub use location::{is_valid_coordinate, ClassificationRecord, GeocodeResult, PointQuery};
pub use region::{Field, RegionFields};
