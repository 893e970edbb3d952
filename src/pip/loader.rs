//! Boundary layer loading from GeoJSON files.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use geo::{Coord, LineString, MultiPolygon, Polygon};
use hashbrown::HashMap;
use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::crs::{Crs, Reprojection};
use super::index::{BoundaryFeature, BoundaryLayer};
use super::schema::LayerSchema;
use crate::models::{Field, LayerKey};

/// Failure to load one boundary layer
#[derive(Debug, thiserror::Error)]
pub enum LayerLoadError {
    #[error("boundary file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {} as GeoJSON: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("{} declares no coordinate reference system", .0.display())]
    MissingCrs(PathBuf),

    #[error("{} uses unsupported coordinate reference system '{crs}'", path.display())]
    UnsupportedCrs { path: PathBuf, crs: String },

    #[error("{layer} layer {} is missing column {column} (available: {available})", path.display())]
    MissingColumn {
        path: PathBuf,
        layer: LayerKey,
        column: &'static str,
        available: String,
    },

    #[error("{} contains no polygon features", .0.display())]
    Empty(PathBuf),
}

#[derive(Debug, Deserialize)]
struct FeatureCollectionDoc {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    crs: Option<CrsDoc>,
    #[serde(default)]
    features: Vec<FeatureDoc>,
}

/// Named (`{"type":"name"}`) or legacy EPSG (`{"type":"EPSG"}`) CRS member
#[derive(Debug, Deserialize)]
struct CrsDoc {
    #[serde(default)]
    properties: CrsProperties,
}

#[derive(Debug, Default, Deserialize)]
struct CrsProperties {
    name: Option<String>,
    code: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FeatureDoc {
    #[serde(default)]
    geometry: Option<GeometryDoc>,
    #[serde(default)]
    properties: Option<HashMap<String, PropertyValue>>,
}

/// Scalar attribute value; nested values are not kept
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PropertyValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
    Other(IgnoredAny),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeometryDoc {
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
    #[serde(other)]
    Other,
}

impl GeometryDoc {
    fn kind(&self) -> &'static str {
        match self {
            GeometryDoc::Polygon { .. } => "Polygon",
            GeometryDoc::MultiPolygon { .. } => "MultiPolygon",
            GeometryDoc::Other => "non-polygon",
        }
    }
}

type Ring = Vec<Vec<f64>>;

/// Load the layer for `key` using its standard column mapping
pub fn load_layer(path: &Path, key: LayerKey) -> Result<BoundaryLayer, LayerLoadError> {
    load_layer_with_schema(path, &LayerSchema::for_key(key))
}

/// Load a layer, keeping only the geometry and the schema's columns.
///
/// Geometries are reprojected to WGS84 here so lookups never transform.
/// Source features are consumed one at a time as they are converted.
pub fn load_layer_with_schema(
    path: &Path,
    schema: &LayerSchema,
) -> Result<BoundaryLayer, LayerLoadError> {
    if !path.exists() {
        return Err(LayerLoadError::NotFound(path.to_path_buf()));
    }

    info!("Loading {} boundaries from {}", schema.key, path.display());

    let file = File::open(path).map_err(|source| LayerLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_err = |message: String| LayerLoadError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let doc: FeatureCollectionDoc = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| parse_err(e.to_string()))?;
    if doc.kind != "FeatureCollection" {
        return Err(parse_err(format!(
            "expected a FeatureCollection, found '{}'",
            doc.kind
        )));
    }

    if doc.features.is_empty() {
        return Err(LayerLoadError::Empty(path.to_path_buf()));
    }

    let crs = resolve_crs(path, doc.crs.as_ref())?;
    let reprojection = crs.to_wgs84();
    if !reprojection.is_identity() {
        info!("Reprojecting {} boundaries from {} to EPSG:4326", schema.key, crs);
    }

    // Column names come from the first feature carrying properties
    let mut keys: Vec<String> = doc
        .features
        .iter()
        .find_map(|f| f.properties.as_ref())
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default();
    keys.sort();

    let columns = schema
        .resolve(keys.iter().map(String::as_str))
        .map_err(|column| LayerLoadError::MissingColumn {
            path: path.to_path_buf(),
            layer: schema.key,
            column,
            available: keys.join(", "),
        })?;
    debug!("{} column mapping: {:?}", schema.key, columns);

    let mut features = Vec::with_capacity(doc.features.len());
    let mut skipped = 0usize;

    for (i, feature) in doc.features.into_iter().enumerate() {
        let FeatureDoc {
            geometry,
            properties,
        } = feature;
        let Some(geometry) = geometry else {
            skipped += 1;
            continue;
        };

        let kind = geometry.kind();
        let Some(multi) = to_multipolygon(geometry, &reprojection)
            .map_err(|e| parse_err(format!("feature {}: {}", i, e)))?
        else {
            debug!("Skipping feature {} with {} geometry", i, kind);
            skipped += 1;
            continue;
        };

        let attributes = properties
            .map(|props| extract_attributes(props, &columns))
            .unwrap_or_default();

        features.push(BoundaryFeature::new(attributes, multi));
    }

    if features.is_empty() {
        return Err(LayerLoadError::Empty(path.to_path_buf()));
    }
    if skipped > 0 {
        warn!(
            "Skipped {} non-polygon features in {}",
            skipped,
            path.display()
        );
    }

    info!("Loaded {} {} features", features.len(), schema.key);

    Ok(BoundaryLayer::build(schema.key, crs, features))
}

fn resolve_crs(path: &Path, doc: Option<&CrsDoc>) -> Result<Crs, LayerLoadError> {
    let props = doc
        .map(|d| &d.properties)
        .filter(|p| p.name.is_some() || p.code.is_some())
        .ok_or_else(|| LayerLoadError::MissingCrs(path.to_path_buf()))?;

    let (label, code) = match (&props.name, props.code) {
        (Some(name), _) => (name.clone(), Crs::parse_epsg(name)),
        (None, Some(code)) => (format!("EPSG:{}", code), Some(code)),
        (None, None) => return Err(LayerLoadError::MissingCrs(path.to_path_buf())),
    };

    code.and_then(Crs::from_epsg)
        .ok_or_else(|| LayerLoadError::UnsupportedCrs {
            path: path.to_path_buf(),
            crs: label,
        })
}

/// Keep and stringify the mapped property values of one feature
fn extract_attributes(
    mut props: HashMap<String, PropertyValue>,
    columns: &[(Field, String)],
) -> HashMap<Field, String> {
    columns
        .iter()
        .filter_map(|(field, source)| {
            let value = match props.remove(source)? {
                PropertyValue::Text(s) => s.trim().to_string(),
                PropertyValue::Number(n) => n.to_string(),
                PropertyValue::Flag(b) => b.to_string(),
                PropertyValue::Other(_) => return None,
            };
            (!value.is_empty()).then_some((*field, value))
        })
        .collect()
}

/// Convert a polygonal geometry; `Ok(None)` for other geometry types
fn to_multipolygon(
    geometry: GeometryDoc,
    reprojection: &Reprojection,
) -> Result<Option<MultiPolygon<f64>>, String> {
    let polygons = match geometry {
        GeometryDoc::Polygon { coordinates } => vec![to_polygon(&coordinates, reprojection)?],
        GeometryDoc::MultiPolygon { coordinates } => coordinates
            .iter()
            .map(|rings| to_polygon(rings, reprojection))
            .collect::<Result<Vec<_>, _>>()?,
        GeometryDoc::Other => return Ok(None),
    };
    Ok(Some(MultiPolygon::new(polygons)))
}

fn to_polygon(rings: &[Ring], reprojection: &Reprojection) -> Result<Polygon<f64>, String> {
    let mut rings = rings
        .iter()
        .map(|ring| to_line_string(ring, reprojection));
    let exterior = rings
        .next()
        .ok_or_else(|| "polygon has no exterior ring".to_string())??;
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn to_line_string(ring: &[Vec<f64>], reprojection: &Reprojection) -> Result<LineString<f64>, String> {
    ring.iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(reprojection.apply(Coord { x: *x, y: *y })),
            _ => Err(format!("position {:?} has fewer than two ordinates", position)),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    pub(crate) fn write_geojson(dir: &TempDir, name: &str, doc: &Value) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(doc.to_string().as_bytes()).unwrap();
        path
    }

    pub(crate) fn named_crs(code: u32) -> Value {
        json!({"type": "name", "properties": {"name": format!("urn:ogc:def:crs:EPSG::{}", code)}})
    }

    fn square_coords(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Value {
        json!([[[min_x, min_y], [max_x, min_y], [max_x, max_y], [min_x, max_y], [min_x, min_y]]])
    }

    fn iare_doc(crs: Option<Value>) -> Value {
        let mut doc = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {
                    "IARE_CODE21": "701001",
                    "IARE_NAME21": "Darwin",
                    "IREG_CODE21": 701,
                    "IREG_NAME21": "Darwin",
                    "AREASQKM21": 123.4
                },
                "geometry": {"type": "Polygon", "coordinates": square_coords(130.8, -12.5, 130.9, -12.4)}
            }, {
                "type": "Feature",
                "properties": {"IARE_CODE21": "x", "IARE_NAME21": "x", "IREG_CODE21": "x", "IREG_NAME21": "x"},
                "geometry": {"type": "Point", "coordinates": [131.0, -12.0]}
            }]
        });
        if let Some(crs) = crs {
            doc["crs"] = crs;
        }
        doc
    }

    #[test]
    fn test_load_layer_file_not_found() {
        let err = load_layer(Path::new("nonexistent_file.geojson"), LayerKey::Sa1).unwrap_err();
        assert!(matches!(err, LayerLoadError::NotFound(_)));
    }

    #[test]
    fn test_load_layer_keeps_only_mapped_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_geojson(&dir, "iare.geojson", &iare_doc(Some(named_crs(7844))));

        let layer = load_layer(&path, LayerKey::Iare).unwrap();
        assert_eq!(layer.len(), 1);
        let feature = &layer.features()[0];
        assert_eq!(feature.attributes.len(), 4);
        assert_eq!(feature.get(Field::IareCode), Some("701001"));
        // Numeric codes are stringified
        assert_eq!(feature.get(Field::IregCode), Some("701"));
    }

    #[test]
    fn test_load_layer_without_crs_fails() {
        let dir = TempDir::new().unwrap();
        let path = write_geojson(&dir, "iare.geojson", &iare_doc(None));
        let err = load_layer(&path, LayerKey::Iare).unwrap_err();
        assert!(matches!(err, LayerLoadError::MissingCrs(_)), "{}", err);
    }

    #[test]
    fn test_load_layer_unsupported_crs_fails() {
        let dir = TempDir::new().unwrap();
        let path = write_geojson(&dir, "iare.geojson", &iare_doc(Some(named_crs(2193))));
        let err = load_layer(&path, LayerKey::Iare).unwrap_err();
        assert!(matches!(err, LayerLoadError::UnsupportedCrs { .. }), "{}", err);
    }

    #[test]
    fn test_legacy_epsg_crs_member() {
        let dir = TempDir::new().unwrap();
        let crs = json!({"type": "EPSG", "properties": {"code": 4283}});
        let path = write_geojson(&dir, "iare.geojson", &iare_doc(Some(crs)));
        let layer = load_layer(&path, LayerKey::Iare).unwrap();
        assert_eq!(layer.source_crs().epsg(), 4283);
    }

    #[test]
    fn test_load_layer_missing_required_column() {
        let dir = TempDir::new().unwrap();
        let path = write_geojson(&dir, "iare.geojson", &iare_doc(Some(named_crs(4326))));
        let err = load_layer(&path, LayerKey::Sa1).unwrap_err();
        match err {
            LayerLoadError::MissingColumn { column, layer, .. } => {
                assert_eq!(column, "SA1_CODE");
                assert_eq!(layer, LayerKey::Sa1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_load_layer_unparsable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.geojson");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_layer(&path, LayerKey::Sa2).unwrap_err(),
            LayerLoadError::Parse { .. }
        ));
    }

    #[test]
    fn test_load_layer_reprojects_albers() {
        use crate::pip::crs::Albers;

        let albers = Albers::australian();
        let corners: Vec<[f64; 2]> = [
            (130.8, -12.5),
            (130.9, -12.5),
            (130.9, -12.4),
            (130.8, -12.4),
            (130.8, -12.5),
        ]
        .iter()
        .map(|&(x, y)| {
            let p = albers.forward(Coord { x, y });
            [p.x, p.y]
        })
        .collect();

        let doc = json!({
            "type": "FeatureCollection",
            "crs": named_crs(3577),
            "features": [{
                "type": "Feature",
                "properties": {"SA2_CODE21": "701011002", "SA2_NAME21": "Darwin City"},
                "geometry": {"type": "MultiPolygon", "coordinates": [[corners]]}
            }]
        });

        let dir = TempDir::new().unwrap();
        let path = write_geojson(&dir, "sa2.geojson", &doc);
        let layer = load_layer(&path, LayerKey::Sa2).unwrap();

        let m = layer.lookup(130.84, -12.46);
        assert_eq!(m.feature.unwrap().get(Field::Sa2Name), Some("Darwin City"));
        assert!(layer.lookup(131.5, -12.46).feature.is_none());
    }

    #[test]
    fn test_load_layer_drops_nested_values_and_foreign_geometries() {
        let doc = json!({
            "type": "FeatureCollection",
            "crs": named_crs(4326),
            "features": [{
                "type": "Feature",
                "properties": {
                    "SA2_CODE21": "701011002",
                    "SA2_NAME21": {"en": "Darwin City"},
                    "LOCI_URI21": "http://linked.data.gov.au/dataset/asgsed3/SA2/701011002"
                },
                "geometry": {"type": "Polygon", "coordinates": square_coords(130.8, -12.5, 130.9, -12.4)}
            }, {
                "type": "Feature",
                "properties": {"SA2_CODE21": "x", "SA2_NAME21": "x"},
                "geometry": {"type": "GeometryCollection", "geometries": []}
            }, {
                "type": "Feature",
                "properties": {"SA2_CODE21": "y", "SA2_NAME21": "y"},
                "geometry": null
            }]
        });
        let dir = TempDir::new().unwrap();
        let path = write_geojson(&dir, "sa2.geojson", &doc);
        let layer = load_layer(&path, LayerKey::Sa2).unwrap();

        assert_eq!(layer.len(), 1);
        let feature = &layer.features()[0];
        assert_eq!(feature.attributes.len(), 1);
        assert_eq!(feature.get(Field::Sa2Code), Some("701011002"));
        assert_eq!(feature.get(Field::Sa2Name), None);
    }

    #[test]
    fn test_load_layer_bad_ring_is_parse_error() {
        let doc = json!({
            "type": "FeatureCollection",
            "crs": named_crs(4326),
            "features": [{
                "type": "Feature",
                "properties": {"SA2_CODE21": "1"},
                "geometry": {"type": "Polygon", "coordinates": [[[130.8], [130.9, -12.5], [130.8, -12.5]]]}
            }]
        });
        let dir = TempDir::new().unwrap();
        let path = write_geojson(&dir, "sa2.geojson", &doc);
        assert!(matches!(
            load_layer(&path, LayerKey::Sa2).unwrap_err(),
            LayerLoadError::Parse { .. }
        ));
    }
}
