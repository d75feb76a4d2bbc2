//! Bibliographic provider capability interface
//!
//! Both external search services expose the same three capabilities —
//! fuzzy title search, a canonical citation count, and a paginated
//! citing-work listing — so the resolver, aggregator, retry controller,
//! and orchestrator are written once against this trait and reused across
//! provider adapters.

use std::time::Duration;
use thiserror::Error;

/// Provider call errors, classified for the retry controller
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 429 — the provider asked us to slow down
    #[error("Rate limit exceeded")]
    RateLimited,

    /// HTTP 5xx — transient server-side failure
    #[error("Server error {0}")]
    Server(u16),

    /// Connection, DNS, or timeout failure before a status was received
    #[error("Network error: {0}")]
    Network(String),

    /// Any other non-2xx status; never retried
    #[error("API error {0}: {1}")]
    Status(u16, String),

    /// Response body did not match the expected shape; never retried
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// Whether the retry controller may attempt the call again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited | ApiError::Server(_) | ApiError::Network(_)
        )
    }

    /// Classify a reqwest transport failure
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }

    /// Classify a non-2xx response status
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => ApiError::RateLimited,
            500..=599 => ApiError::Server(status),
            _ => ApiError::Status(status, body),
        }
    }
}

/// One search hit for a title query
#[derive(Debug, Clone)]
pub struct SearchCandidate {
    /// Provider-canonical work identifier
    pub id: String,
    /// Display title, scored against the query title
    pub title: String,
    /// Total citation count as reported alongside the hit
    pub citation_count: u64,
}

/// Minimal projection of one citing work
#[derive(Debug, Clone)]
pub struct CitingWork {
    pub year: Option<i32>,
    pub venue: Option<String>,
}

/// Capability interface over the external bibliographic services
///
/// Adapters own their HTTP client and request pacing; error classification
/// is uniform so callers route every failure through the retry controller.
#[allow(async_fn_in_trait)]
pub trait BibliographicProvider {
    /// Short provider name for logging
    fn name(&self) -> &'static str;

    /// Citing-work page size requested from the provider
    fn page_size(&self) -> usize;

    /// Cooperative inter-page throttle (not an error-driven backoff)
    fn page_delay(&self) -> Duration;

    /// Fuzzy title search returning a small candidate list
    async fn search(&self, title: &str) -> Result<Vec<SearchCandidate>, ApiError>;

    /// Canonical total citation count for an identifier
    async fn citation_count(&self, paper_id: &str) -> Result<u64, ApiError>;

    /// One page of citing works, projected to year and venue
    async fn citing_works(&self, paper_id: &str, offset: usize)
        -> Result<Vec<CitingWork>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            ApiError::from_status(429, String::new()),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(503, String::new()),
            ApiError::Server(503)
        ));
        assert!(matches!(
            ApiError::from_status(404, String::new()),
            ApiError::Status(404, _)
        ));
    }

    #[test]
    fn retryability_follows_taxonomy() {
        assert!(ApiError::RateLimited.is_retryable());
        assert!(ApiError::Server(500).is_retryable());
        assert!(ApiError::Network("reset".to_string()).is_retryable());
        assert!(!ApiError::Status(403, String::new()).is_retryable());
        assert!(!ApiError::Parse("bad json".to_string()).is_retryable());
    }
}
