//! Forward geocoding of location names.
//!
//! Requests go through a shared [`RateLimiter`] and are retried with
//! bounded exponential backoff on transient failures.

mod client;
mod nominatim;
mod query;
mod rate_limit;
mod types;

pub use client::{GeocodingClient, RetryPolicy};
pub use nominatim::{NominatimBackend, DEFAULT_ENDPOINT};
pub use query::{QueryPlan, QueryPolicy};
pub use rate_limit::RateLimiter;
pub use types::{Candidate, GeocodeBackend, GeocodeError};

#[cfg(test)]
pub(crate) use client::tests::{darwin, ScriptedBackend};
