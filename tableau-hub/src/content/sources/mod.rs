//! Museum open-access API adapters
//!
//! One adapter per provider, each rate limited with `governor` and bounded by
//! its own request timeout.

pub mod artic;
pub mod cleveland;
pub mod met;

pub use artic::ArticSource;
pub use cleveland::ClevelandSource;
pub use met::MetSource;

use crate::content::types::SourceError;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;

const USER_AGENT: &str = concat!("Tableau/", env!("CARGO_PKG_VERSION"));

/// Direct (unkeyed) limiter shared by all calls of one adapter
pub(crate) type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Limiter allowing `per_second` requests per second (minimum 1)
pub(crate) fn rate_limiter(per_second: u32) -> Limiter {
    let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rate))
}

/// HTTP client with the adapter's timeout
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| SourceError::Setup(e.to_string()))
}

/// Map a non-success status to `SourceError::Api`
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(SourceError::Api {
        status: status.as_u16(),
        message: message.chars().take(200).collect(),
    })
}

/// Read a dimension that providers send either as a number or a string
pub(crate) fn dimension(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|d| d.is_finite() && *d > 0.0)
}

/// Non-blank string field
pub(crate) fn text(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Identifier that may arrive as a number or a string
pub(crate) fn identifier(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
