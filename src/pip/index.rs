//! In-memory boundary layer with an R-tree for point lookups.

use geo::{BoundingRect, Contains, Intersects, MultiPolygon, Point};
use hashbrown::HashMap;
use rstar::{RTree, RTreeObject, AABB};
use tracing::info;

use super::crs::Crs;
use crate::models::{Field, LayerKey};

/// A single boundary polygon with the output fields it resolves to
#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    pub attributes: HashMap<Field, String>,
    pub geometry: MultiPolygon<f64>,
}

impl BoundaryFeature {
    pub fn new(attributes: HashMap<Field, String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            attributes,
            geometry,
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.attributes.get(&field).map(String::as_str)
    }
}

/// R-tree entry pointing back at a feature by load order
#[derive(Debug, Clone)]
struct IndexedFeature {
    ordinal: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Result of looking a point up in one layer
#[derive(Debug, Clone, Copy)]
pub struct LayerMatch<'a> {
    pub feature: Option<&'a BoundaryFeature>,
    /// Number of polygons strictly containing the point
    pub contained_in: usize,
    /// The chosen polygon only touches the point on its boundary
    pub on_boundary: bool,
}

impl LayerMatch<'_> {
    pub fn is_ambiguous(&self) -> bool {
        self.contained_in > 1
    }
}

/// Read-only polygon layer in WGS84.
///
/// Loaded once per run and shared (via `Arc`) by all classification work.
pub struct BoundaryLayer {
    key: LayerKey,
    source_crs: Crs,
    features: Vec<BoundaryFeature>,
    tree: RTree<IndexedFeature>,
}

impl std::fmt::Debug for BoundaryLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryLayer")
            .field("key", &self.key)
            .field("source_crs", &self.source_crs)
            .field("features", &self.features.len())
            .finish()
    }
}

impl BoundaryLayer {
    /// Build a layer from features already in WGS84
    pub fn build(key: LayerKey, source_crs: Crs, features: Vec<BoundaryFeature>) -> Self {
        let indexed: Vec<IndexedFeature> = features
            .iter()
            .enumerate()
            .filter_map(|(ordinal, f)| {
                let rect = f.geometry.bounding_rect()?;
                Some(IndexedFeature {
                    ordinal,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        let tree = RTree::bulk_load(indexed);
        info!(
            "{} layer indexed with {} polygons (source {})",
            key,
            tree.size(),
            source_crs
        );

        Self {
            key,
            source_crs,
            features,
            tree,
        }
    }

    pub fn key(&self) -> LayerKey {
        self.key
    }

    pub fn source_crs(&self) -> Crs {
        self.source_crs
    }

    pub fn features(&self) -> &[BoundaryFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Find the polygon containing a point.
    ///
    /// Strict containment wins; among several containing polygons the first
    /// in file order is chosen. A point on a shared edge is contained by
    /// neither neighbour, so it falls back to the first polygon (in file
    /// order) whose boundary it touches.
    pub fn lookup(&self, lon: f64, lat: f64) -> LayerMatch<'_> {
        let point = Point::new(lon, lat);
        let query_envelope = AABB::from_point([lon, lat]);

        let mut candidates: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query_envelope)
            .map(|ib| ib.ordinal)
            .collect();
        candidates.sort_unstable();

        let mut contained = candidates
            .iter()
            .map(|&i| &self.features[i])
            .filter(|f| f.geometry.contains(&point));

        if let Some(first) = contained.next() {
            return LayerMatch {
                feature: Some(first),
                contained_in: 1 + contained.count(),
                on_boundary: false,
            };
        }

        let touching = candidates
            .iter()
            .map(|&i| &self.features[i])
            .find(|f| f.geometry.intersects(&point));

        LayerMatch {
            feature: touching,
            contained_in: 0,
            on_boundary: touching.is_some(),
        }
    }
}
