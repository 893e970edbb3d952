//! Run-level success counts per layer.

use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::models::{ClassificationRecord, LayerKey};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerTally {
    pub matched: usize,
    /// Points with a usable coordinate
    pub total: usize,
    /// Points inside more than one polygon of the layer
    pub multi_match: usize,
}

impl LayerTally {
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matched as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationSummary {
    pub total_locations: usize,
    pub geocoded: usize,
    pub invalid_coordinates: usize,
    pub layers: BTreeMap<LayerKey, LayerTally>,
    /// STATE_NAME -> number of records
    pub states: BTreeMap<String, usize>,
}

impl ClassificationSummary {
    pub fn from_records(records: &[ClassificationRecord], layers: &[LayerKey]) -> Self {
        let mut summary = Self {
            total_locations: records.len(),
            layers: layers.iter().map(|k| (*k, LayerTally::default())).collect(),
            ..Default::default()
        };

        for record in records {
            if record.invalid_coordinate {
                summary.invalid_coordinates += 1;
                continue;
            }
            if record.latitude.is_none() || record.longitude.is_none() {
                continue;
            }
            summary.geocoded += 1;

            for (key, tally) in summary.layers.iter_mut() {
                tally.total += 1;
                if record.matched(*key) {
                    tally.matched += 1;
                }
                if record.multi_match.contains(key) {
                    tally.multi_match += 1;
                }
            }

            if let Some(state) = &record.regions.state_name {
                *summary.states.entry(state.clone()).or_default() += 1;
            }
        }

        summary
    }

    pub fn geocoding_rate(&self) -> f64 {
        if self.total_locations == 0 {
            0.0
        } else {
            self.geocoded as f64 / self.total_locations as f64
        }
    }
}

/// Minimum share of names that must geocode for a run to pass validation
pub const DEFAULT_MIN_SUCCESS_RATE: f64 = 0.8;

/// Rough Australian extent as (min, max) latitude and longitude
const AUSTRALIA_LAT: (f64, f64) = (-44.0, -10.0);
const AUSTRALIA_LON: (f64, f64) = (113.0, 154.0);

/// Sanity checks over freshly geocoded records
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeCheck {
    pub checked: usize,
    pub success_rate: f64,
    pub min_success_rate: f64,
    /// (name, lat, lon) of points outside the Australian extent
    pub outside_australia: Vec<(String, f64, f64)>,
}

impl GeocodeCheck {
    pub fn run(records: &[ClassificationRecord], min_success_rate: f64) -> Self {
        let with_coords: Vec<(&ClassificationRecord, f64, f64)> = records
            .iter()
            .filter(|r| !r.invalid_coordinate)
            .filter_map(|r| Some((r, r.latitude?, r.longitude?)))
            .collect();

        let success_rate = if records.is_empty() {
            0.0
        } else {
            with_coords.len() as f64 / records.len() as f64
        };

        let outside_australia = with_coords
            .iter()
            .filter(|(_, lat, lon)| {
                *lat < AUSTRALIA_LAT.0
                    || *lat > AUSTRALIA_LAT.1
                    || *lon < AUSTRALIA_LON.0
                    || *lon > AUSTRALIA_LON.1
            })
            .map(|(r, lat, lon)| (r.name.clone(), *lat, *lon))
            .collect();

        Self {
            checked: records.len(),
            success_rate,
            min_success_rate,
            outside_australia,
        }
    }

    /// False for an empty batch or a success rate below the minimum.
    ///
    /// Points outside Australia are reported but do not fail the check.
    pub fn passed(&self) -> bool {
        self.checked > 0 && self.success_rate >= self.min_success_rate
    }

    pub fn log(&self) {
        if self.checked == 0 {
            warn!("No locations to validate");
            return;
        }
        info!(
            "Geocoding success rate: {:.1}% of {}",
            self.success_rate * 100.0,
            self.checked
        );
        if self.success_rate < self.min_success_rate {
            warn!(
                "Geocoding success rate {:.1}% is below minimum {:.1}%",
                self.success_rate * 100.0,
                self.min_success_rate * 100.0
            );
        }
        if !self.outside_australia.is_empty() {
            warn!(
                "Found {} coordinates outside Australia bounds",
                self.outside_australia.len()
            );
            for (name, lat, lon) in &self.outside_australia {
                warn!("  {}: ({:.4}, {:.4})", name, lat, lon);
            }
        }
    }
}
