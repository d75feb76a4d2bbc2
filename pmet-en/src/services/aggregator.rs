//! Citation aggregation for a resolved paper
//!
//! Pages through the citing-work listing and reduces it into year and
//! venue-tier aggregates. Aggregation is all-or-nothing: a page failure
//! discards the partial result and the record stays pending, so a
//! half-computed histogram is never persisted.

use crate::models::record::{zero_histogram, HISTOGRAM_FIRST_YEAR, HISTOGRAM_LAST_YEAR};
use crate::models::venue::{VenueCatalog, VenueTier};
use crate::services::provider::BibliographicProvider;
use crate::utils::retry::{with_retry, RetryError, RetryPolicy};
use std::collections::BTreeMap;

/// Year, venue-tier, and total aggregates over a paper's citing works
///
/// Invariants: `top_conference + top_journal <= total` and the histogram
/// sum never exceeds `total` (citing works outside the supported year
/// range count toward the total only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationAggregates {
    pub total: u64,
    pub top_conference: u64,
    pub top_journal: u64,
    pub by_year: BTreeMap<i32, u64>,
}

impl CitationAggregates {
    fn empty() -> Self {
        Self {
            total: 0,
            top_conference: 0,
            top_journal: 0,
            by_year: zero_histogram(),
        }
    }
}

/// Aggregate the citing works of a resolved identifier
///
/// **Algorithm:**
/// 1. Fetch the canonical citation count. Zero short-circuits with all-zero
///    aggregates and no pagination call.
/// 2. Page through the citing works, pacing pages with the provider's
///    cooperative delay; stop on an empty page, on reaching the total, or
///    on a short page.
/// 3. Fold each citing work into the histogram (supported years only) and
///    the venue tier counters.
pub async fn aggregate<P: BibliographicProvider>(
    provider: &P,
    catalog: &VenueCatalog,
    policy: &RetryPolicy,
    paper_id: &str,
) -> Result<CitationAggregates, RetryError> {
    let count_operation = format!("{} citation count", provider.name());
    let total = with_retry(&count_operation, policy, || {
        provider.citation_count(paper_id)
    })
    .await?;

    let mut aggregates = CitationAggregates::empty();
    aggregates.total = total;

    if total == 0 {
        return Ok(aggregates);
    }

    tracing::debug!(paper_id = %paper_id, total, "Fetching citing works");

    let page_operation = format!("{} citing works", provider.name());
    let page_size = provider.page_size();
    let mut fetched: u64 = 0;
    let mut offset = 0usize;

    loop {
        let works = with_retry(&page_operation, policy, || {
            provider.citing_works(paper_id, offset)
        })
        .await?;

        if works.is_empty() {
            break;
        }

        let page_len = works.len();
        fetched += page_len as u64;
        offset += page_len;

        for work in &works {
            if let Some(year) = work.year {
                if (HISTOGRAM_FIRST_YEAR..=HISTOGRAM_LAST_YEAR).contains(&year) {
                    *aggregates.by_year.entry(year).or_insert(0) += 1;
                }
            }

            match catalog.classify(work.venue.as_deref()) {
                VenueTier::TopConference => aggregates.top_conference += 1,
                VenueTier::TopJournal => aggregates.top_journal += 1,
                VenueTier::Unranked => {}
            }
        }

        if fetched >= total || page_len < page_size {
            break;
        }

        tokio::time::sleep(provider.page_delay()).await;
    }

    tracing::debug!(
        paper_id = %paper_id,
        total,
        fetched,
        top_conference = aggregates.top_conference,
        top_journal = aggregates.top_journal,
        "Citation aggregation complete"
    );

    Ok(aggregates)
}
