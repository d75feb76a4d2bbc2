//! Semantic Scholar Graph API client
//!
//! Citing works come from the paper's `citations` endpoint with an
//! offset/limit cursor; the canonical citation count comes from the paper
//! detail endpoint, not from the citation listing.

use crate::services::provider::{ApiError, BibliographicProvider, CitingWork, SearchCandidate};
use crate::utils::rate_limit::RateLimiter;
use serde::Deserialize;
use std::time::Duration;

const GRAPH_BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const USER_AGENT: &str = "pmet/0.1.0 (mailto:contact@pmet.dev)";
const SEARCH_LIMIT: usize = 5;
const PAGE_SIZE: usize = 1000;
const PAGE_DELAY_MS: u64 = 1000;
// Authenticated requests get a higher request budget
const RATE_LIMIT_KEYED_MS: u64 = 334;
const RATE_LIMIT_PUBLIC_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<RawPaper>,
}

#[derive(Debug, Deserialize)]
struct RawPaper {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "citationCount", default)]
    citation_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PaperDetail {
    #[serde(rename = "citationCount", default)]
    citation_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CitationsResponse {
    #[serde(default)]
    data: Vec<RawCitation>,
}

#[derive(Debug, Deserialize)]
struct RawCitation {
    #[serde(rename = "citingPaper")]
    citing_paper: Option<RawCitingPaper>,
}

#[derive(Debug, Deserialize)]
struct RawCitingPaper {
    year: Option<i32>,
    venue: Option<String>,
}

/// Semantic Scholar API client
pub struct SemanticScholarClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(api_key: Option<String>) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ApiError::from_reqwest)?;

        let interval_ms = if api_key.is_some() {
            RATE_LIMIT_KEYED_MS
        } else {
            RATE_LIMIT_PUBLIC_MS
        };

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(Duration::from_millis(interval_ms)),
            api_key,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.rate_limiter.wait().await;

        let mut request = self.http_client.get(url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(ApiError::from_reqwest)?;

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

fn candidates_from(response: SearchResponse) -> Vec<SearchCandidate> {
    response
        .data
        .into_iter()
        .filter_map(|raw| {
            let id = raw.paper_id?;
            let title = raw.title?;
            Some(SearchCandidate {
                id,
                title,
                citation_count: raw.citation_count.unwrap_or(0),
            })
        })
        .collect()
}

fn citing_works_from(response: CitationsResponse) -> Vec<CitingWork> {
    response
        .data
        .into_iter()
        .map(|raw| match raw.citing_paper {
            Some(paper) => CitingWork {
                year: paper.year,
                venue: paper.venue.filter(|v| !v.is_empty()),
            },
            None => CitingWork {
                year: None,
                venue: None,
            },
        })
        .collect()
}

impl BibliographicProvider for SemanticScholarClient {
    fn name(&self) -> &'static str {
        "semantic-scholar"
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn page_delay(&self) -> Duration {
        Duration::from_millis(PAGE_DELAY_MS)
    }

    async fn search(&self, title: &str) -> Result<Vec<SearchCandidate>, ApiError> {
        let url = format!("{}/paper/search", GRAPH_BASE_URL);
        let query = [
            ("query", title.to_string()),
            ("limit", SEARCH_LIMIT.to_string()),
            ("fields", "paperId,title,citationCount".to_string()),
        ];

        tracing::debug!(title = %title, "Querying Semantic Scholar search");

        let response: SearchResponse = self.get_json(&url, &query).await?;
        Ok(candidates_from(response))
    }

    async fn citation_count(&self, paper_id: &str) -> Result<u64, ApiError> {
        let url = format!("{}/paper/{}", GRAPH_BASE_URL, paper_id);
        let query = [("fields", "citationCount".to_string())];

        let detail: PaperDetail = self.get_json(&url, &query).await?;
        Ok(detail.citation_count.unwrap_or(0))
    }

    async fn citing_works(
        &self,
        paper_id: &str,
        offset: usize,
    ) -> Result<Vec<CitingWork>, ApiError> {
        let url = format!("{}/paper/{}/citations", GRAPH_BASE_URL, paper_id);
        let query = [
            ("fields", "year,venue".to_string()),
            ("offset", offset.to_string()),
            ("limit", PAGE_SIZE.to_string()),
        ];

        tracing::debug!(paper_id = %paper_id, offset, "Fetching Semantic Scholar citations");

        let response: CitationsResponse = self.get_json(&url, &query).await?;
        Ok(citing_works_from(response))
    }
}
