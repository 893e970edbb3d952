//! Geocoding results and classification records.

use super::{Field, LayerKey, RegionFields};

/// Whether a latitude/longitude pair lies within WGS84 bounds
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Outcome of geocoding one location name.
///
/// A successful result always carries an in-range coordinate; a failed
/// one carries no coordinate and a non-empty error.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    /// Name as supplied by the caller
    pub name: String,
    /// Query string actually sent upstream (after normalization)
    pub query: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub formatted_address: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

impl GeocodeResult {
    /// Build a successful result, or a failed one if the coordinate is out of range.
    pub fn found(
        name: impl Into<String>,
        query: impl Into<String>,
        lat: f64,
        lon: f64,
        formatted_address: Option<String>,
    ) -> Self {
        let name = name.into();
        let query = query.into();
        if !is_valid_coordinate(lat, lon) {
            return Self::failed(
                name,
                query,
                format!("geocoder returned out-of-range coordinate ({}, {})", lat, lon),
            );
        }
        Self {
            name,
            query,
            latitude: Some(lat),
            longitude: Some(lon),
            formatted_address,
            success: true,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            latitude: None,
            longitude: None,
            formatted_address: None,
            success: false,
            error: Some(error.into()),
        }
    }

    /// Coordinate as (lat, lon) for successful results
    pub fn coordinate(&self) -> Option<(f64, f64)> {
        match (self.success, self.latitude, self.longitude) {
            (true, Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// A point handed to the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct PointQuery {
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub formatted_address: Option<String>,
    /// Upstream failure carried through to the record
    pub error: Option<String>,
}

impl PointQuery {
    pub fn new(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            name: name.into(),
            latitude: Some(lat),
            longitude: Some(lon),
            formatted_address: None,
            error: None,
        }
    }
}

impl From<&GeocodeResult> for PointQuery {
    fn from(result: &GeocodeResult) -> Self {
        let (latitude, longitude) = match result.coordinate() {
            Some((lat, lon)) => (Some(lat), Some(lon)),
            None => (None, None),
        };
        Self {
            name: result.name.clone(),
            latitude,
            longitude,
            formatted_address: result.formatted_address.clone(),
            error: result.error.clone(),
        }
    }
}

/// One classified output row.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRecord {
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub formatted_address: Option<String>,

    pub regions: RegionFields,

    pub geocode_success: bool,
    pub error_message: Option<String>,

    /// Coordinate present but outside WGS84 bounds
    pub invalid_coordinate: bool,

    /// Layers where the point fell inside more than one polygon
    pub multi_match: Vec<LayerKey>,
}

impl ClassificationRecord {
    /// Record with no region fields populated
    pub fn unclassified(point: &PointQuery) -> Self {
        Self {
            name: point.name.clone(),
            latitude: point.latitude,
            longitude: point.longitude,
            formatted_address: point.formatted_address.clone(),
            regions: RegionFields::default(),
            geocode_success: point.latitude.is_some() && point.longitude.is_some(),
            error_message: point.error.clone(),
            invalid_coordinate: false,
            multi_match: Vec::new(),
        }
    }

    /// Whether any of a layer's fields were filled
    pub fn matched(&self, layer: LayerKey) -> bool {
        layer.fields().iter().any(|f| self.regions.get(*f).is_some())
    }

    /// Column headers in output order
    pub fn csv_header() -> Vec<&'static str> {
        let mut header = vec!["name", "latitude", "longitude", "formatted_address"];
        header.extend(Field::all().iter().map(|f| f.column()));
        header.extend(["geocode_success", "error_message"]);
        header
    }

    /// Row values aligned with [`ClassificationRecord::csv_header`]
    pub fn csv_row(&self) -> Vec<String> {
        let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        let mut row = vec![
            self.name.clone(),
            opt(self.latitude),
            opt(self.longitude),
            self.formatted_address.clone().unwrap_or_default(),
        ];
        row.extend(
            Field::all()
                .iter()
                .map(|f| self.regions.get(*f).unwrap_or_default().to_string()),
        );
        row.push(self.geocode_success.to_string());
        row.push(self.error_message.clone().unwrap_or_default());
        row
    }
}
