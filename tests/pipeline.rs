use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use asgs_geoclass::config::LayersConfig;
use asgs_geoclass::geocoder::{
    Candidate, GeocodeBackend, GeocodeError, GeocodingClient, QueryPolicy, RateLimiter,
    RetryPolicy,
};
use asgs_geoclass::pip::{Classifier, LayerLoadError, LayerTally};
use asgs_geoclass::pipeline::{load_layers, Pipeline};
use asgs_geoclass::LayerKey;

/// Geocoder answering from a fixed gazetteer
#[derive(Default)]
struct Gazetteer {
    places: HashMap<String, (f64, f64)>,
    flaky: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<String>>,
}

impl Gazetteer {
    fn with(mut self, query: &str, lat: f64, lon: f64) -> Self {
        self.places.insert(query.to_string(), (lat, lon));
        self
    }

    fn failing_first(self, query: &str, times: u32) -> Self {
        self.flaky.lock().unwrap().insert(query.to_string(), times);
        self
    }
}

impl GeocodeBackend for Gazetteer {
    async fn search(&self, query: &str) -> Result<Option<Candidate>, GeocodeError> {
        self.calls.lock().unwrap().push(query.to_string());
        if let Some(left) = self.flaky.lock().unwrap().get_mut(query) {
            if *left > 0 {
                *left -= 1;
                return Err(GeocodeError::Server(503));
            }
        }
        Ok(self.places.get(query).map(|&(lat, lon)| Candidate {
            lat,
            lon,
            display_name: Some(query.to_string()),
        }))
    }
}

fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Value {
    json!([[[min_x, min_y], [max_x, min_y], [max_x, max_y], [min_x, max_y], [min_x, min_y]]])
}

fn write_layer(dir: &Path, name: &str, features: Vec<Value>) -> PathBuf {
    let doc = json!({
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::7844"}},
        "features": features,
    });
    let path = dir.join(name);
    std::fs::write(&path, doc.to_string()).unwrap();
    path
}

fn sa1_feature(code: &str, sa2: &str, sa3_name: &str, bounds: (f64, f64, f64, f64)) -> Value {
    json!({
        "type": "Feature",
        "properties": {
            "SA1_CODE21": code,
            "SA2_CODE21": sa2,
            "SA2_NAME21": sa3_name,
            "SA3_CODE21": &sa2[..5],
            "SA3_NAME21": sa3_name,
            "SA4_CODE21": &sa2[..3],
            "SA4_NAME21": "Darwin",
            "GCC_CODE21": "7GDAR",
            "GCC_NAME21": "Greater Darwin",
            "STE_CODE21": "7",
            "STE_NAME21": "Northern Territory"
        },
        "geometry": {"type": "Polygon", "coordinates": square(bounds.0, bounds.1, bounds.2, bounds.3)}
    })
}

fn asgs_dir(with_iare: bool) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_layer(
        dir.path(),
        "SA1_2021_AUST_GDA2020.geojson",
        vec![
            sa1_feature("70101100101", "701011001", "Darwin City", (130.80, -12.50, 130.90, -12.40)),
            sa1_feature("70102100201", "701021002", "Palmerston", (130.90, -12.55, 131.00, -12.45)),
        ],
    );
    if with_iare {
        write_layer(
            dir.path(),
            "IARE_2021_AUST_GDA2020.geojson",
            vec![json!({
                "type": "Feature",
                "properties": {
                    "IARE_CODE21": "701001",
                    "IARE_NAME21": "Darwin",
                    "IREG_CODE21": "701",
                    "IREG_NAME21": "Darwin"
                },
                "geometry": {"type": "MultiPolygon", "coordinates": [square(130.0, -13.0, 131.5, -12.0)]}
            })],
        );
    }
    dir
}

fn pipeline(backend: Gazetteer, dir: &Path) -> Pipeline<Gazetteer> {
    let config = LayersConfig {
        asgs_dir: Some(dir.to_path_buf()),
        ..Default::default()
    };
    let (layers, failed) = load_layers(&config);
    assert!(failed.is_empty());

    let client = GeocodingClient::new(
        backend,
        Arc::new(RateLimiter::new(Duration::from_millis(1000))),
        QueryPolicy::new(vec!["CHC".to_string()], Some("Australia".to_string())),
        RetryPolicy::default(),
    );
    Pipeline::new(client, Classifier::new(layers))
}

#[tokio::test(start_paused = true)]
async fn test_darwin_hospital_classified_end_to_end() {
    let dir = asgs_dir(true);
    let p = pipeline(
        Gazetteer::default().with("Darwin Hospital, NT, Australia", -12.46, 130.84),
        dir.path(),
    );

    let records = p
        .run(&["Darwin Hospital, NT".to_string()], &AtomicBool::new(false))
        .await;

    let r = &records[0];
    assert!(r.geocode_success);
    assert_eq!(r.regions.sa1_code.as_deref(), Some("70101100101"));
    assert_eq!(r.regions.sa3_name.as_deref(), Some("Darwin City"));
    assert_eq!(r.regions.gccsa_name.as_deref(), Some("Greater Darwin"));
    assert_eq!(r.regions.state_name.as_deref(), Some("Northern Territory"));
    assert_eq!(r.regions.iare_name.as_deref(), Some("Darwin"));
}

#[tokio::test(start_paused = true)]
async fn test_chc_token_is_stripped_before_querying() {
    let dir = asgs_dir(false);
    let p = pipeline(
        Gazetteer::default().with("Palmerston, NT, Australia", -12.50, 130.95),
        dir.path(),
    );

    let records = p
        .run(&["Palmerston CHC, NT".to_string()], &AtomicBool::new(false))
        .await;

    assert_eq!(records[0].name, "Palmerston CHC, NT");
    assert_eq!(records[0].regions.sa3_name.as_deref(), Some("Palmerston"));
    assert!(records[0].regions.iare_code.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let dir = asgs_dir(false);
    let p = pipeline(
        Gazetteer::default()
            .with("Darwin, Australia", -12.46, 130.84)
            .failing_first("Darwin, Australia", 2),
        dir.path(),
    );

    let start = tokio::time::Instant::now();
    let records = p.run(&["Darwin".to_string()], &AtomicBool::new(false)).await;

    assert!(records[0].geocode_success);
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_batch_summary_counts_matches_and_failures() {
    let dir = asgs_dir(true);
    let p = pipeline(
        Gazetteer::default()
            .with("Darwin, Australia", -12.46, 130.84)
            .with("Null Island, Australia", 0.0, 0.0),
        dir.path(),
    );
    let names: Vec<String> = ["Darwin", "Unknown Place", "Null Island"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let records = p.run(&names, &AtomicBool::new(false)).await;
    assert_eq!(records.len(), 3);
    assert!(!records[1].geocode_success);
    assert!(records[1].error_message.is_some());
    assert!(records[2].geocode_success);
    assert!(records[2].regions.is_empty());

    let summary = p.summarize(&records);
    assert_eq!(summary.total_locations, 3);
    assert_eq!(summary.geocoded, 2);
    assert_eq!(
        summary.layers[&LayerKey::Sa1],
        LayerTally {
            matched: 1,
            total: 2,
            multi_match: 0
        }
    );
    assert_eq!(summary.layers[&LayerKey::Iare].matched, 1);
    assert_eq!(summary.states["Northern Territory"], 1);
    assert!(summary.layers.contains_key(&LayerKey::Ste));
}

#[tokio::test(start_paused = true)]
async fn test_layer_without_crs_is_omitted_and_run_continues() {
    let dir = asgs_dir(false);
    let iare = json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {
                "IARE_CODE21": "701001",
                "IARE_NAME21": "Darwin",
                "IREG_CODE21": "701",
                "IREG_NAME21": "Darwin"
            },
            "geometry": {"type": "Polygon", "coordinates": square(130.0, -13.0, 131.5, -12.0)}
        }]
    });
    std::fs::write(
        dir.path().join("IARE_2021_AUST_GDA2020.geojson"),
        iare.to_string(),
    )
    .unwrap();

    let config = LayersConfig {
        asgs_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let (layers, failed) = load_layers(&config);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, LayerKey::Iare);
    assert!(matches!(failed[0].1, LayerLoadError::MissingCrs(_)), "{}", failed[0].1);

    let client = GeocodingClient::new(
        Gazetteer::default().with("Darwin, Australia", -12.46, 130.84),
        Arc::new(RateLimiter::new(Duration::from_millis(1000))),
        QueryPolicy::new(vec!["CHC".to_string()], Some("Australia".to_string())),
        RetryPolicy::default(),
    );
    let p = Pipeline::new(client, Classifier::new(layers));
    let records = p.run(&["Darwin".to_string()], &AtomicBool::new(false)).await;

    let r = &records[0];
    assert_eq!(r.regions.sa1_code.as_deref(), Some("70101100101"));
    assert_eq!(r.regions.state_name.as_deref(), Some("Northern Territory"));
    assert!(r.regions.iare_code.is_none());
    assert!(r.regions.iare_name.is_none());
    assert!(r.regions.ireg_code.is_none());
    assert!(r.regions.ireg_name.is_none());
    assert!(!p.summarize(&records).layers.contains_key(&LayerKey::Iare));
}
