//! Backend seam and error taxonomy for geocoding.

use std::future::Future;

/// First candidate returned by the upstream geocoder
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub lat: f64,
    pub lon: f64,
    pub display_name: Option<String>,
}

/// Failure of a single upstream query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeocodeError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited by upstream (HTTP 429)")]
    RateLimited,

    #[error("upstream server error (HTTP {0})")]
    Server(u16),

    #[error("upstream returned an empty response")]
    EmptyResponse,

    #[error("could not parse upstream response: {0}")]
    InvalidResponse(String),

    #[error("upstream rejected the request (HTTP {0})")]
    Rejected(u16),

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("no match found")]
    NotFound,
}

impl GeocodeError {
    /// Transient failures are retried with backoff; the rest end the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GeocodeError::Network(_)
                | GeocodeError::Timeout
                | GeocodeError::RateLimited
                | GeocodeError::Server(_)
                | GeocodeError::EmptyResponse
                | GeocodeError::InvalidResponse(_)
        )
    }

    /// Classify an HTTP status that is not a success
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => GeocodeError::RateLimited,
            500..=599 => GeocodeError::Server(status),
            _ => GeocodeError::Rejected(status),
        }
    }
}

/// Upstream geocoding service.
///
/// Implementations send exactly one request per call and return the first
/// candidate in the service's own order, or `None` when it has no hits.
pub trait GeocodeBackend: Send + Sync {
    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Option<Candidate>, GeocodeError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(GeocodeError::from_status(429).is_retryable());
        assert!(GeocodeError::from_status(503).is_retryable());
        assert!(!GeocodeError::from_status(400).is_retryable());
        assert!(!GeocodeError::from_status(403).is_retryable());
        assert!(!GeocodeError::NotFound.is_retryable());
        assert!(!GeocodeError::MalformedQuery(String::new()).is_retryable());
    }
}
