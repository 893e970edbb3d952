//! Nominatim search backend.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::types::{Candidate, GeocodeBackend, GeocodeError};

pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";

/// Queries the Nominatim `/search` endpoint
pub struct NominatimBackend {
    client: Client,
    endpoint: Url,
    country_codes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

impl NominatimBackend {
    pub fn new(
        endpoint: &str,
        user_agent: &str,
        timeout: Duration,
        country_codes: Option<String>,
    ) -> Result<Self, GeocodeError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| GeocodeError::MalformedQuery(e.to_string()))?;
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| GeocodeError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            country_codes: country_codes.filter(|c| !c.trim().is_empty()),
        })
    }

    fn search_url(&self, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", query);
            pairs.append_pair("format", "json");
            pairs.append_pair("limit", "1");
            if let Some(codes) = &self.country_codes {
                pairs.append_pair("countrycodes", codes);
            }
        }
        url
    }
}

fn transport_error(e: reqwest::Error) -> GeocodeError {
    if e.is_timeout() {
        GeocodeError::Timeout
    } else {
        GeocodeError::Network(e.to_string())
    }
}

/// Parse a Nominatim JSON body into its first candidate
fn parse_hits(body: &[u8]) -> Result<Option<Candidate>, GeocodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(GeocodeError::EmptyResponse);
    }

    let hits: Vec<SearchHit> =
        serde_json::from_slice(body).map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;

    let Some(hit) = hits.into_iter().next() else {
        return Ok(None);
    };

    let lat: f64 = hit
        .lat
        .trim()
        .parse()
        .map_err(|_| GeocodeError::InvalidResponse(format!("bad latitude '{}'", hit.lat)))?;
    let lon: f64 = hit
        .lon
        .trim()
        .parse()
        .map_err(|_| GeocodeError::InvalidResponse(format!("bad longitude '{}'", hit.lon)))?;

    Ok(Some(Candidate {
        lat,
        lon,
        display_name: hit.display_name,
    }))
}

impl GeocodeBackend for NominatimBackend {
    async fn search(&self, query: &str) -> Result<Option<Candidate>, GeocodeError> {
        let url = self.search_url(query);
        debug!("Nominatim request: {}", url);

        let response = self.client.get(url).send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::from_status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        parse_hits(&body)
    }
}
