//! Resume support: reuse rows from a previous output file.
//!
//! A name whose cached row has coordinates and an SA1 code is complete and
//! is copied through. A cached row with coordinates only is classified
//! again without another geocoding request. Everything else is geocoded.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use tracing::{info, warn};

use crate::models::{ClassificationRecord, Field, GeocodeResult, RegionFields};

/// Parse a previous output CSV into records
pub fn read_records(path: &Path) -> Result<Vec<ClassificationRecord>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = csv_reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);

    let name_idx = column("name").context("Column 'name' not found")?;
    let lat_idx = column("latitude");
    let lon_idx = column("longitude");
    let address_idx = column("formatted_address");
    let success_idx = column("geocode_success");
    let error_idx = column("error_message");
    let field_idx: Vec<(Field, usize)> = Field::all()
        .iter()
        .filter_map(|f| column(f.column()).map(|i| (*f, i)))
        .collect();

    let mut records = Vec::new();
    for result in csv_reader.records() {
        let row = result?;
        let name = row.get(name_idx).unwrap_or_default().trim();
        if name.is_empty() {
            continue;
        }

        let latitude = number(&row, lat_idx);
        let longitude = number(&row, lon_idx);
        let mut regions = RegionFields::default();
        for (field, idx) in &field_idx {
            if let Some(value) = text(&row, Some(*idx)) {
                regions.set(*field, value);
            }
        }

        records.push(ClassificationRecord {
            name: name.to_string(),
            latitude,
            longitude,
            formatted_address: text(&row, address_idx),
            regions,
            geocode_success: text(&row, success_idx)
                .map_or(latitude.is_some() && longitude.is_some(), |v| v == "true"),
            error_message: text(&row, error_idx),
            invalid_coordinate: false,
            multi_match: Vec::new(),
        });
    }

    Ok(records)
}

fn text(row: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| row.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn number(row: &StringRecord, idx: Option<usize>) -> Option<f64> {
    idx.and_then(|i| row.get(i))
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Cached rows keyed by name; a missing or unreadable file is an empty cache
pub fn load_cache(path: &Path) -> HashMap<String, ClassificationRecord> {
    if !path.exists() {
        info!("No existing cache found at {}", path.display());
        return HashMap::new();
    }
    match read_records(path) {
        Ok(records) => {
            info!("Loaded cache with {} locations from {}", records.len(), path.display());
            records.into_iter().map(|r| (r.name.clone(), r)).collect()
        }
        Err(e) => {
            warn!("Failed to load cache from {}: {:#}", path.display(), e);
            HashMap::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CacheStatus {
    Complete(ClassificationRecord),
    Geocoded(GeocodeResult),
    Missing,
}

/// What each input name still needs, in input order
#[derive(Debug, Clone)]
pub struct ResumePlan {
    entries: Vec<(String, CacheStatus)>,
}

impl ResumePlan {
    pub fn new(
        names: &[String],
        mut cache: HashMap<String, ClassificationRecord>,
        rebuild: bool,
    ) -> Self {
        if rebuild {
            info!("Rebuild mode: processing all {} locations", names.len());
            cache.clear();
        }

        let entries = names
            .iter()
            .map(|name| {
                let status = match cache.get(name) {
                    Some(cached) => match (cached.latitude, cached.longitude) {
                        (Some(_), Some(_)) if cached.regions.sa1_code.is_some() => {
                            CacheStatus::Complete(cached.clone())
                        }
                        (Some(lat), Some(lon)) => {
                            let result = GeocodeResult::found(
                                name.as_str(),
                                name.as_str(),
                                lat,
                                lon,
                                cached.formatted_address.clone(),
                            );
                            if result.success {
                                CacheStatus::Geocoded(result)
                            } else {
                                CacheStatus::Missing
                            }
                        }
                        _ => CacheStatus::Missing,
                    },
                    None => CacheStatus::Missing,
                };
                (name.clone(), status)
            })
            .collect();

        Self { entries }
    }

    pub fn complete(&self) -> usize {
        self.count(|s| matches!(s, CacheStatus::Complete(_)))
    }

    pub fn classify_only(&self) -> usize {
        self.count(|s| matches!(s, CacheStatus::Geocoded(_)))
    }

    fn count(&self, pred: impl Fn(&CacheStatus) -> bool) -> usize {
        self.entries.iter().filter(|(_, s)| pred(s)).count()
    }

    /// Names that need a geocoding request, each listed once
    pub fn to_geocode(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.entries
            .iter()
            .filter(|(_, s)| matches!(s, CacheStatus::Missing))
            .filter(|(name, _)| seen.insert(name.as_str()))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Cached coordinates that only need classifying
    pub fn cached_geocodes(&self) -> Vec<GeocodeResult> {
        let mut seen = std::collections::HashSet::new();
        self.entries
            .iter()
            .filter_map(|(name, s)| match s {
                CacheStatus::Geocoded(result) if seen.insert(name.as_str()) => Some(result.clone()),
                _ => None,
            })
            .collect()
    }

    /// Merge fresh records with cached complete rows, in input order.
    ///
    /// Names with neither (e.g. after cancellation) are left out.
    pub fn assemble(self, fresh: Vec<ClassificationRecord>) -> Vec<ClassificationRecord> {
        let fresh: HashMap<String, ClassificationRecord> =
            fresh.into_iter().map(|r| (r.name.clone(), r)).collect();

        self.entries
            .into_iter()
            .filter_map(|(name, status)| match status {
                CacheStatus::Complete(record) => Some(record),
                _ => fresh.get(&name).cloned(),
            })
            .collect()
    }
}
