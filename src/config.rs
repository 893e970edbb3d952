use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::geocoder::{
    GeocodeError, GeocodingClient, NominatimBackend, QueryPolicy, RateLimiter, RetryPolicy,
    DEFAULT_ENDPOINT,
};
use crate::models::LayerKey;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("geocoder.max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("geocoder.max_backoff_ms ({max}) is smaller than geocoder.backoff_base_ms ({base})")]
    BackoffCap { base: u64, max: u64 },
    #[error("geocoder.endpoint is empty")]
    EmptyEndpoint,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub geocoder: GeocoderConfig,
    pub layers: LayersConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeocoderConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub min_interval_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_secs: u64,
    pub country_codes: Option<String>,
    pub query_suffix: Option<String>,
    pub strip_tokens: Vec<String>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: "asgs_geoclass".to_string(),
            min_interval_ms: 1000,
            max_attempts: 3,
            backoff_base_ms: 1000,
            max_backoff_ms: 30_000,
            timeout_secs: 10,
            country_codes: Some("au".to_string()),
            query_suffix: None,
            strip_tokens: vec!["CHC".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LayersConfig {
    /// Directory holding ABS boundary files under their published names
    pub asgs_dir: Option<PathBuf>,
    pub sa1: Option<PathBuf>,
    pub sa2: Option<PathBuf>,
    pub sa3: Option<PathBuf>,
    pub sa4: Option<PathBuf>,
    pub gccsa: Option<PathBuf>,
    pub ste: Option<PathBuf>,
    pub iare: Option<PathBuf>,
}

impl LayersConfig {
    fn explicit(&self, key: LayerKey) -> Option<&PathBuf> {
        match key {
            LayerKey::Sa1 => self.sa1.as_ref(),
            LayerKey::Sa2 => self.sa2.as_ref(),
            LayerKey::Sa3 => self.sa3.as_ref(),
            LayerKey::Sa4 => self.sa4.as_ref(),
            LayerKey::Gccsa => self.gccsa.as_ref(),
            LayerKey::Ste => self.ste.as_ref(),
            LayerKey::Iare => self.iare.as_ref(),
        }
    }

    /// Published ABS file name for a layer, e.g. `SA1_2021_AUST_GDA2020.geojson`
    pub fn conventional_name(key: LayerKey) -> String {
        format!("{}_2021_AUST_GDA2020.geojson", key.as_str())
    }

    /// Configured path per layer.
    ///
    /// Explicit paths win; otherwise a file with the conventional name under
    /// `asgs_dir` is used when it exists.
    pub fn paths(&self) -> BTreeMap<LayerKey, PathBuf> {
        let mut paths = BTreeMap::new();
        for key in LayerKey::all() {
            if let Some(path) = self.explicit(*key) {
                paths.insert(*key, path.clone());
                continue;
            }
            if let Some(dir) = &self.asgs_dir {
                let candidate = dir.join(Self::conventional_name(*key));
                if candidate.is_file() {
                    paths.insert(*key, candidate);
                }
            }
        }
        paths
    }
}

impl GeocoderConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn query_policy(&self) -> QueryPolicy {
        QueryPolicy::new(self.strip_tokens.clone(), self.query_suffix.clone())
    }

    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(Duration::from_millis(self.min_interval_ms)))
    }

    pub fn nominatim(&self) -> Result<NominatimBackend, GeocodeError> {
        NominatimBackend::new(
            &self.endpoint,
            &self.user_agent,
            Duration::from_secs(self.timeout_secs),
            self.country_codes.clone(),
        )
    }

    /// Nominatim-backed client with its own rate limiter
    pub fn client(&self) -> Result<GeocodingClient<NominatimBackend>, GeocodeError> {
        Ok(GeocodingClient::new(
            self.nominatim()?,
            self.rate_limiter(),
            self.query_policy(),
            self.retry_policy(),
        ))
    }
}

impl Settings {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let settings: Settings = toml::from_str(&content).context("Failed to parse config file")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.geocoder;
        if g.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if g.max_backoff_ms < g.backoff_base_ms {
            return Err(ConfigError::BackoffCap {
                base: g.backoff_base_ms,
                max: g.max_backoff_ms,
            });
        }
        if g.endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.geocoder.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.geocoder.max_attempts, 3);
        assert_eq!(settings.geocoder.strip_tokens, vec!["CHC".to_string()]);
        assert_eq!(settings.geocoder.country_codes.as_deref(), Some("au"));
        assert!(settings.layers.paths().is_empty());
        assert!(settings.validate().is_ok());

        let retry = settings.geocoder.retry_policy();
        assert_eq!(retry, RetryPolicy::default());
    }

    #[test]
    fn test_partial_geocoder_section() {
        let settings: Settings = toml::from_str(
            r#"
            [geocoder]
            min_interval_ms = 1500
            query_suffix = "Australia"

            [layers]
            iare = "/data/IARE.geojson"
            "#,
        )
        .unwrap();

        assert_eq!(settings.geocoder.min_interval_ms, 1500);
        assert_eq!(settings.geocoder.backoff_base_ms, 1000);
        assert_eq!(
            settings.geocoder.rate_limiter().min_interval(),
            Duration::from_millis(1500)
        );
        let paths = settings.layers.paths();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[&LayerKey::Iare], PathBuf::from("/data/IARE.geojson"));
    }

    #[test]
    fn test_validate_rejects_bad_retry_settings() {
        let mut settings = Settings::default();
        settings.geocoder.max_attempts = 0;
        assert_eq!(settings.validate(), Err(ConfigError::ZeroAttempts));

        let mut settings = Settings::default();
        settings.geocoder.max_backoff_ms = 500;
        assert_eq!(
            settings.validate(),
            Err(ConfigError::BackoffCap { base: 1000, max: 500 })
        );
    }

    #[test]
    fn test_asgs_dir_discovers_conventional_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("SA1_2021_AUST_GDA2020.geojson"), "{}").unwrap();
        fs::write(dir.path().join("IARE_2021_AUST_GDA2020.geojson"), "{}").unwrap();

        let layers = LayersConfig {
            asgs_dir: Some(dir.path().to_path_buf()),
            iare: Some(PathBuf::from("/elsewhere/iare.geojson")),
            ..Default::default()
        };
        let paths = layers.paths();

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[&LayerKey::Sa1], dir.path().join("SA1_2021_AUST_GDA2020.geojson"));
        assert_eq!(paths[&LayerKey::Iare], PathBuf::from("/elsewhere/iare.geojson"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[geocoder]\nmax_attempts = 5").unwrap();
        let settings = Settings::load_from_file(file.path()).unwrap();
        assert_eq!(settings.geocoder.max_attempts, 5);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "[geocoder]\nmax_attempts = 0").unwrap();
        assert!(Settings::load_from_file(bad.path()).is_err());
        assert!(Settings::load_from_file("/nonexistent/settings.toml").is_err());
    }
}
