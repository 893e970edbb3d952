//! Rate-limited, retrying geocoding client.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::query::QueryPolicy;
use super::rate_limit::RateLimiter;
use super::types::{Candidate, GeocodeBackend, GeocodeError};
use crate::models::GeocodeResult;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per name, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Sleep before the attempt following `failed_attempt` (1-based)
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Which query of the plan an attempt sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Primary,
    Fallback,
}

/// Per-request retry state.
///
/// `attempt` counts upstream queries, so the fallback query and every
/// retry draw from the same `max_attempts` budget.
enum Attempt {
    Attempting { attempt: u32, stage: Stage },
    RetryableFailure { attempt: u32, stage: Stage, error: GeocodeError },
    FatalFailure { attempt: u32, error: GeocodeError },
    Succeeded(Candidate),
}

/// Turns location names into coordinates.
///
/// Never fails: every problem comes back as an unsuccessful
/// [`GeocodeResult`] so a batch can carry on to the next name.
pub struct GeocodingClient<B> {
    backend: B,
    limiter: Arc<RateLimiter>,
    policy: QueryPolicy,
    retry: RetryPolicy,
}

impl<B: GeocodeBackend> GeocodingClient<B> {
    pub fn new(backend: B, limiter: Arc<RateLimiter>, policy: QueryPolicy, retry: RetryPolicy) -> Self {
        Self {
            backend,
            limiter,
            policy,
            retry,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Geocode a single name
    pub async fn geocode(&self, name: &str) -> GeocodeResult {
        let Some(plan) = self.policy.plan(name) else {
            return GeocodeResult::failed(
                name,
                "",
                GeocodeError::MalformedQuery("location name is empty".to_string()).to_string(),
            );
        };

        let max_attempts = self.retry.max_attempts.max(1);
        let mut state = Attempt::Attempting {
            attempt: 1,
            stage: Stage::Primary,
        };

        loop {
            state = match state {
                Attempt::Attempting { attempt, stage } => {
                    let query = match (stage, &plan.fallback) {
                        (Stage::Fallback, Some(fallback)) => fallback.as_str(),
                        _ => plan.primary.as_str(),
                    };
                    info!(
                        "Geocoding attempt {}/{}: original='{}' query='{}'",
                        attempt, max_attempts, name, query
                    );
                    match self.query(query).await {
                        Ok(Some(candidate)) => Attempt::Succeeded(candidate),
                        Ok(None) => match (stage, &plan.fallback) {
                            (Stage::Primary, Some(fallback)) if attempt < max_attempts => {
                                debug!("No result for '{}', trying '{}'", query, fallback);
                                Attempt::Attempting {
                                    attempt: attempt + 1,
                                    stage: Stage::Fallback,
                                }
                            }
                            _ => Attempt::FatalFailure {
                                attempt,
                                error: GeocodeError::NotFound,
                            },
                        },
                        Err(error) if error.is_retryable() && attempt < max_attempts => {
                            Attempt::RetryableFailure {
                                attempt,
                                stage,
                                error,
                            }
                        }
                        Err(error) => Attempt::FatalFailure { attempt, error },
                    }
                }
                Attempt::RetryableFailure {
                    attempt,
                    stage,
                    error,
                } => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        "Geocoding error for '{}' (attempt {}): {}; retrying in {:?}",
                        name, attempt, error, delay
                    );
                    tokio::time::sleep(delay).await;
                    // Resume at the query that failed
                    Attempt::Attempting {
                        attempt: attempt + 1,
                        stage,
                    }
                }
                Attempt::FatalFailure { attempt, error } => {
                    let message = if error.is_retryable() {
                        error!("Max retries exceeded for '{}': {}", name, error);
                        format!("gave up after {} attempts: {}", attempt, error)
                    } else {
                        warn!("Geocoding failed for '{}': {}", name, error);
                        error.to_string()
                    };
                    return GeocodeResult::failed(name, plan.primary.clone(), message);
                }
                Attempt::Succeeded(candidate) => {
                    let result = GeocodeResult::found(
                        name,
                        plan.primary.clone(),
                        candidate.lat,
                        candidate.lon,
                        candidate.display_name,
                    );
                    if result.success {
                        debug!("Geocoded '{}' to ({}, {})", name, candidate.lat, candidate.lon);
                    }
                    return result;
                }
            };
        }
    }

    async fn query(&self, query: &str) -> Result<Option<Candidate>, GeocodeError> {
        self.limiter.acquire().await;
        self.backend.search(query).await
    }
}
