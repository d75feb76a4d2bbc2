//! OpenAlex API client
//!
//! Work identifiers are kept in their canonical URL form
//! (`https://openalex.org/W...`) as returned by the API, and shortened to
//! the trailing path segment when placed in query filters.

use crate::services::provider::{ApiError, BibliographicProvider, CitingWork, SearchCandidate};
use crate::utils::rate_limit::RateLimiter;
use serde::Deserialize;
use std::time::Duration;

const OPENALEX_BASE_URL: &str = "https://api.openalex.org";
const USER_AGENT: &str = "pmet/0.1.0 (mailto:contact@pmet.dev)";
const SEARCH_LIMIT: usize = 5;
const PAGE_SIZE: usize = 200;
const PAGE_DELAY_MS: u64 = 500;
const RATE_LIMIT_MS: u64 = 100; // polite pool allows ~10 requests/second

/// Search and citing-work listing response
#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<RawWork>,
}

#[derive(Debug, Deserialize)]
struct RawWork {
    id: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    cited_by_count: u64,
    publication_year: Option<i32>,
    primary_location: Option<RawLocation>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    source: Option<RawSource>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    display_name: Option<String>,
}

/// Single-work projection used for the citation count lookup
#[derive(Debug, Deserialize)]
struct RawWorkCount {
    #[serde(default)]
    cited_by_count: u64,
}

/// OpenAlex API client
pub struct OpenAlexClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl OpenAlexClient {
    pub fn new() -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ApiError::from_reqwest)?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(Duration::from_millis(RATE_LIMIT_MS)),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.rate_limiter.wait().await;

        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

/// Trailing path segment of a work id URL
fn short_work_id(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

fn candidates_from(response: WorksResponse) -> Vec<SearchCandidate> {
    response
        .results
        .into_iter()
        .filter_map(|raw| {
            let id = raw.id?;
            let title = raw.display_name?;
            Some(SearchCandidate {
                id,
                title,
                citation_count: raw.cited_by_count,
            })
        })
        .collect()
}

fn citing_works_from(response: WorksResponse) -> Vec<CitingWork> {
    response
        .results
        .into_iter()
        .map(|raw| CitingWork {
            year: raw.publication_year,
            venue: raw
                .primary_location
                .and_then(|loc| loc.source)
                .and_then(|source| source.display_name),
        })
        .collect()
}

impl BibliographicProvider for OpenAlexClient {
    fn name(&self) -> &'static str {
        "openalex"
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn page_delay(&self) -> Duration {
        Duration::from_millis(PAGE_DELAY_MS)
    }

    async fn search(&self, title: &str) -> Result<Vec<SearchCandidate>, ApiError> {
        let url = format!("{}/works", OPENALEX_BASE_URL);
        let query = [
            ("filter", format!("title.search:{}", title)),
            ("per-page", SEARCH_LIMIT.to_string()),
        ];

        tracing::debug!(title = %title, "Querying OpenAlex search");

        let response: WorksResponse = self.get_json(&url, &query).await?;
        Ok(candidates_from(response))
    }

    async fn citation_count(&self, paper_id: &str) -> Result<u64, ApiError> {
        let url = format!("{}/works/{}", OPENALEX_BASE_URL, short_work_id(paper_id));
        let query = [("select", "cited_by_count".to_string())];

        let work: RawWorkCount = self.get_json(&url, &query).await?;
        Ok(work.cited_by_count)
    }

    async fn citing_works(
        &self,
        paper_id: &str,
        offset: usize,
    ) -> Result<Vec<CitingWork>, ApiError> {
        let page = offset / PAGE_SIZE + 1;
        let url = format!("{}/works", OPENALEX_BASE_URL);
        let query = [
            ("filter", format!("cites:{}", short_work_id(paper_id))),
            ("per-page", PAGE_SIZE.to_string()),
            ("page", page.to_string()),
            ("select", "publication_year,primary_location".to_string()),
        ];

        tracing::debug!(paper_id = %paper_id, page, "Fetching OpenAlex citing works");

        let response: WorksResponse = self.get_json(&url, &query).await?;
        Ok(citing_works_from(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_strips_url_prefix() {
        assert_eq!(short_work_id("https://openalex.org/W2741809807"), "W2741809807");
        assert_eq!(short_work_id("W2741809807"), "W2741809807");
    }

    #[test]
    fn search_response_maps_to_candidates() {
        let response: WorksResponse = serde_json::from_str(
            r#"{
                "results": [
                    {
                        "id": "https://openalex.org/W1",
                        "display_name": "Attention Is All You Need",
                        "cited_by_count": 50000
                    },
                    {
                        "id": "https://openalex.org/W2",
                        "display_name": null
                    }
                ]
            }"#,
        )
        .unwrap();

        let candidates = candidates_from(response);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "https://openalex.org/W1");
        assert_eq!(candidates[0].citation_count, 50000);
    }

    #[test]
    fn citing_works_project_year_and_venue() {
        let response: WorksResponse = serde_json::from_str(
            r#"{
                "results": [
                    {
                        "publication_year": 2020,
                        "primary_location": {
                            "source": { "display_name": "NeurIPS" }
                        }
                    },
                    {
                        "publication_year": null,
                        "primary_location": null
                    }
                ]
            }"#,
        )
        .unwrap();

        let works = citing_works_from(response);
        assert_eq!(works.len(), 2);
        assert_eq!(works[0].year, Some(2020));
        assert_eq!(works[0].venue.as_deref(), Some("NeurIPS"));
        assert_eq!(works[1].year, None);
        assert_eq!(works[1].venue, None);
    }

    #[test]
    fn empty_response_is_valid() {
        let response: WorksResponse = serde_json::from_str("{}").unwrap();
        assert!(candidates_from(response).is_empty());
    }
}
