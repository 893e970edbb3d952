//! End-to-end run: geocode names one at a time, then classify the batch.

use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::LayersConfig;
use crate::geocoder::{GeocodeBackend, GeocodingClient};
use crate::models::{ClassificationRecord, GeocodeResult, LayerKey, PointQuery};
use crate::pip::{load_layer, BoundaryLayer, ClassificationSummary, Classifier, LayerLoadError};

const HEALTH_QUERY: &str = "Alice Springs, NT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub geocoder: bool,
    pub layers: Vec<LayerKey>,
}

/// Load every configured layer.
///
/// Layers are independent, so a failure is reported alongside the layers
/// that did load instead of aborting the run.
pub fn load_layers(
    config: &LayersConfig,
) -> (Vec<Arc<BoundaryLayer>>, Vec<(LayerKey, LayerLoadError)>) {
    let paths: Vec<_> = config.paths().into_iter().collect();
    if paths.is_empty() {
        warn!("No boundary layers configured");
    }

    let results: Vec<_> = paths
        .par_iter()
        .map(|(key, path)| (*key, load_layer(path, *key)))
        .collect();

    let mut loaded = Vec::new();
    let mut failed = Vec::new();
    for (key, result) in results {
        match result {
            Ok(layer) => loaded.push(Arc::new(layer)),
            Err(e) => {
                error!("Failed to load {} layer: {}", key, e);
                failed.push((key, e));
            }
        }
    }
    (loaded, failed)
}

pub struct Pipeline<B> {
    geocoder: GeocodingClient<B>,
    classifier: Classifier,
}

impl<B: GeocodeBackend> Pipeline<B> {
    pub fn new(geocoder: GeocodingClient<B>, classifier: Classifier) -> Self {
        Self {
            geocoder,
            classifier,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Geocode names strictly in order, stopping early when `cancel` is set.
    ///
    /// `on_result` is called after each name, e.g. to tick a progress bar.
    pub async fn geocode_all<F>(
        &self,
        names: &[String],
        cancel: &AtomicBool,
        mut on_result: F,
    ) -> Vec<GeocodeResult>
    where
        F: FnMut(&GeocodeResult),
    {
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            if cancel.load(Ordering::Relaxed) {
                warn!(
                    "Cancelled after {} of {} locations",
                    results.len(),
                    names.len()
                );
                break;
            }
            let result = self.geocoder.geocode(name).await;
            on_result(&result);
            results.push(result);
        }

        let ok = results.iter().filter(|r| r.success).count();
        info!("Geocoded {}/{} locations", ok, results.len());
        results
    }

    /// Geocode then classify, one record per processed name in input order
    pub async fn run(&self, names: &[String], cancel: &AtomicBool) -> Vec<ClassificationRecord> {
        let geocoded = self.geocode_all(names, cancel, |_| {}).await;
        self.classify(&geocoded)
    }

    pub fn classify(&self, geocoded: &[GeocodeResult]) -> Vec<ClassificationRecord> {
        let points: Vec<PointQuery> = geocoded.iter().map(PointQuery::from).collect();
        self.classifier.classify(&points)
    }

    pub fn summarize(&self, records: &[ClassificationRecord]) -> ClassificationSummary {
        self.classifier.summarize(records)
    }

    /// Query the geocoder once and report which layers are available
    pub async fn health(&self) -> HealthReport {
        let check = self.geocoder.geocode(HEALTH_QUERY).await;
        if !check.success {
            warn!(
                "Health check query '{}' failed: {}",
                HEALTH_QUERY,
                check.error.as_deref().unwrap_or("unknown error")
            );
        }

        let layers = self.classifier.covered_layers();
        let status = if check.success && self.classifier.has_layers() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        HealthReport {
            status,
            geocoder: check.success,
            layers,
        }
    }
}
