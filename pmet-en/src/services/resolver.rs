//! Title resolution against a bibliographic search service
//!
//! Precision over recall: a false match corrupts every downstream aggregate
//! for the record, so no candidate is accepted below the similarity
//! threshold. "No match" is an authoritative provider answer; it is never
//! produced by a failure to complete the search.

use crate::services::provider::{BibliographicProvider, SearchCandidate};
use crate::utils::retry::{with_retry, RetryError, RetryPolicy};

/// Minimum title similarity for an accepted match
pub const SIMILARITY_THRESHOLD: f64 = 0.85;

/// Result of resolving one title
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    /// The best candidate met the similarity threshold
    Matched {
        paper_id: String,
        citation_count: u64,
    },
    /// The provider answered and had no acceptable match
    NoMatch,
    /// Retries exhausted; resolution was never completed
    Unavailable,
}

/// Case-insensitive normalized edit similarity between two titles, in [0, 1]
pub fn title_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Select the highest-scoring candidate, if any meets the threshold
pub fn best_candidate<'a>(
    title: &str,
    candidates: &'a [SearchCandidate],
) -> Option<&'a SearchCandidate> {
    let mut best: Option<(&SearchCandidate, f64)> = None;

    for candidate in candidates {
        let score = title_similarity(title, &candidate.title);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((candidate, score));
        }
    }

    best.filter(|(_, score)| *score >= SIMILARITY_THRESHOLD)
        .map(|(candidate, _)| candidate)
}

/// Resolve a title to a canonical identifier via fuzzy search
pub async fn resolve<P: BibliographicProvider>(
    provider: &P,
    policy: &RetryPolicy,
    title: &str,
) -> ResolveOutcome {
    let operation = format!("{} search", provider.name());

    match with_retry(&operation, policy, || provider.search(title)).await {
        Ok(candidates) => match best_candidate(title, &candidates) {
            Some(candidate) => {
                tracing::debug!(
                    title = %title,
                    paper_id = %candidate.id,
                    "Title resolved"
                );
                ResolveOutcome::Matched {
                    paper_id: candidate.id.clone(),
                    citation_count: candidate.citation_count,
                }
            }
            None => {
                tracing::debug!(
                    title = %title,
                    candidates = candidates.len(),
                    "No candidate met the similarity threshold"
                );
                ResolveOutcome::NoMatch
            }
        },
        // The provider rejected the request outright; treat like an empty
        // result set rather than a controller-level failure.
        Err(RetryError::Fatal(err)) => {
            tracing::debug!(title = %title, error = %err, "Search rejected, treating as no match");
            ResolveOutcome::NoMatch
        }
        Err(err) => {
            tracing::warn!(title = %title, error = %err, "Search never completed");
            ResolveOutcome::Unavailable
        }
    }
}
