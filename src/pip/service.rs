//! Classifier assigning points to ASGS and Indigenous regions.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::index::{BoundaryLayer, LayerMatch};
use super::summary::ClassificationSummary;
use crate::models::{is_valid_coordinate, ClassificationRecord, LayerKey, PointQuery};

/// Point-in-polygon classifier over the layers loaded for a run.
///
/// Layers are read-only; classification holds no mutable state, so the same
/// inputs always produce the same records.
#[derive(Clone, Default)]
pub struct Classifier {
    layers: BTreeMap<LayerKey, Arc<BoundaryLayer>>,
}

impl Classifier {
    /// Create a classifier from loaded layers, keyed by each layer's own key
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Arc<BoundaryLayer>>,
    {
        let mut by_key = BTreeMap::new();
        for layer in layers {
            if by_key.insert(layer.key(), layer).is_some() {
                warn!("Duplicate boundary layer supplied; keeping the last one");
            }
        }
        Self { layers: by_key }
    }

    pub fn layer(&self, key: LayerKey) -> Option<&BoundaryLayer> {
        self.layers.get(&key).map(Arc::as_ref)
    }

    pub fn has_layers(&self) -> bool {
        !self.layers.is_empty()
    }

    /// Layers whose fields this classifier can fill.
    ///
    /// SA1 covers every parent level through its denormalized attributes.
    pub fn covered_layers(&self) -> Vec<LayerKey> {
        let has_sa1 = self.layers.contains_key(&LayerKey::Sa1);
        LayerKey::all()
            .iter()
            .copied()
            .filter(|key| {
                self.layers.contains_key(key)
                    || (has_sa1 && LayerKey::sa1_parents().contains(key))
            })
            .collect()
    }

    /// Classify a batch of points, preserving input order
    pub fn classify(&self, points: &[PointQuery]) -> Vec<ClassificationRecord> {
        info!(
            "Classifying {} points against layers {:?}",
            points.len(),
            self.layers.keys().collect::<Vec<_>>()
        );

        let records: Vec<ClassificationRecord> =
            points.par_iter().map(|p| self.classify_point(p)).collect();

        let classified = records.iter().filter(|r| !r.regions.is_empty()).count();
        let with_coords = records
            .iter()
            .filter(|r| r.latitude.is_some() && !r.invalid_coordinate)
            .count();
        info!(
            "Classification complete: {}/{} points classified",
            classified, with_coords
        );

        records
    }

    /// Classify a single point
    pub fn classify_point(&self, point: &PointQuery) -> ClassificationRecord {
        let mut record = ClassificationRecord::unclassified(point);

        let (lat, lon) = match (point.latitude, point.longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return record,
        };

        if !is_valid_coordinate(lat, lon) {
            debug!("Point '{}' has out-of-range coordinate ({}, {})", point.name, lat, lon);
            record.invalid_coordinate = true;
            record.geocode_success = false;
            record.error_message = Some(match &point.error {
                Some(upstream) => format!("{}; coordinate out of range", upstream),
                None => format!("coordinate out of range: ({}, {})", lat, lon),
            });
            return record;
        }

        if let Some(sa1) = self.layers.get(&LayerKey::Sa1) {
            // One join fills the whole SA hierarchy from SA1's own attributes
            self.apply(&mut record, sa1.lookup(lon, lat), LayerKey::Sa1);
        } else {
            for key in LayerKey::sa1_parents() {
                if let Some(layer) = self.layers.get(key) {
                    self.apply(&mut record, layer.lookup(lon, lat), *key);
                }
            }
        }

        if let Some(iare) = self.layers.get(&LayerKey::Iare) {
            self.apply(&mut record, iare.lookup(lon, lat), LayerKey::Iare);
        }

        record
    }

    fn apply(&self, record: &mut ClassificationRecord, found: LayerMatch<'_>, key: LayerKey) {
        if found.is_ambiguous() {
            debug!(
                "'{}' falls inside {} {} polygons; using the first",
                record.name, found.contained_in, key
            );
            record.multi_match.push(key);
        }
        if let Some(feature) = found.feature {
            for (field, value) in &feature.attributes {
                record.regions.set(*field, value.clone());
            }
        }
    }

    /// Aggregate per-layer match counts over a batch of records
    pub fn summarize(&self, records: &[ClassificationRecord]) -> ClassificationSummary {
        ClassificationSummary::from_records(records, &self.covered_layers())
    }
}
