//! Enrichment orchestrator
//!
//! Partitions the pending rows into batches, runs each batch through a
//! bounded worker pool, merges completed results single-threaded, and
//! checkpoints the table and ledger at every batch boundary. Workers never
//! touch shared state: each one owns exactly one record for its lifetime
//! and reports an outcome back for the merge step.
//!
//! A run always terminates successfully; per-record failures surface in the
//! run summary and the not-found ledger, never as an aborted batch.

use crate::models::venue::VenueCatalog;
use crate::services::aggregator::{self, CitationAggregates};
use crate::services::provider::BibliographicProvider;
use crate::services::resolver::{self, ResolveOutcome};
use crate::store::{NotFoundLedger, RecordTable};
use crate::utils::retry::RetryPolicy;
use futures::stream::{self, StreamExt};
use pmet_common::Result;
use std::sync::Arc;
use std::time::Duration;

/// Which rows a run considers for processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentScope {
    /// Every row missing its identifier or citation count
    AllPending,
    /// Only pending rows whose title is in the not-found ledger
    /// (the retry pass against an alternate provider)
    LedgerOnly,
}

/// Batch, worker, and retry tuning for a run
#[derive(Debug, Clone)]
pub struct EnrichmentOptions {
    /// Records per batch; the checkpoint boundary
    pub batch_size: usize,
    /// Worker pool width within a batch
    pub concurrency: usize,
    /// Retry budget for each external call
    pub retry: RetryPolicy,
    /// Row selection for this run
    pub scope: EnrichmentScope,
    /// Pause between batches (cooperative pacing, not backoff)
    pub batch_pause: Duration,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            concurrency: 3,
            retry: RetryPolicy::default(),
            scope: EnrichmentScope::AllPending,
            batch_pause: Duration::from_secs(1),
        }
    }
}

/// Counters for one orchestrator run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub enriched: usize,
    pub not_found: usize,
    pub still_pending: usize,
}

impl std::ops::AddAssign for RunSummary {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.enriched += other.enriched;
        self.not_found += other.not_found;
        self.still_pending += other.still_pending;
    }
}

/// Per-record worker outcome, merged single-threaded after each batch
enum RecordOutcome {
    /// Resolution and aggregation both succeeded
    Enriched {
        paper_id: String,
        aggregates: CitationAggregates,
    },
    /// The provider authoritatively had no acceptable match
    NotFound,
    /// The work was never completed; eligible for the next run
    Pending,
}

/// Drives resolution and aggregation over one record table
pub struct EnrichmentOrchestrator<P> {
    provider: Arc<P>,
    catalog: Arc<VenueCatalog>,
    options: EnrichmentOptions,
}

impl<P: BibliographicProvider> EnrichmentOrchestrator<P> {
    pub fn new(provider: Arc<P>, catalog: Arc<VenueCatalog>, options: EnrichmentOptions) -> Self {
        Self {
            provider,
            catalog,
            options,
        }
    }

    /// Process every pending row of a table, checkpointing per batch
    pub async fn run(
        &self,
        table: &mut RecordTable,
        ledger: &mut NotFoundLedger,
    ) -> Result<RunSummary> {
        let pending = self.pending_rows(table, ledger);
        let total_batches = pending.len().div_ceil(self.options.batch_size);

        tracing::info!(
            table = %table.path().display(),
            rows = table.len(),
            pending = pending.len(),
            batches = total_batches,
            provider = self.provider.name(),
            "Starting enrichment run"
        );

        let mut summary = RunSummary::default();

        for (batch_index, batch) in pending.chunks(self.options.batch_size).enumerate() {
            tracing::info!(
                batch = batch_index + 1,
                batches = total_batches,
                rows = batch.len(),
                "Processing batch"
            );

            let outcomes: Vec<(usize, String, RecordOutcome)> =
                stream::iter(batch.iter().cloned())
                    .map(|(row, title)| {
                        let provider = Arc::clone(&self.provider);
                        let catalog = Arc::clone(&self.catalog);
                        let retry = self.options.retry.clone();
                        async move {
                            let outcome =
                                enrich_record(provider.as_ref(), catalog.as_ref(), &retry, &title)
                                    .await;
                            (row, title, outcome)
                        }
                    })
                    .buffer_unordered(self.options.concurrency)
                    .collect()
                    .await;

            // Merge in completion order; this is the only place the table
            // and ledger are mutated.
            for (row, title, outcome) in outcomes {
                summary.processed += 1;
                match outcome {
                    RecordOutcome::Enriched {
                        paper_id,
                        aggregates,
                    } => {
                        let mut record = table.record(row)?;
                        record.paper_id = Some(paper_id);
                        record.citation_count = Some(aggregates.total);
                        record.top_conference_citations = aggregates.top_conference;
                        record.top_journal_citations = aggregates.top_journal;
                        record.citations_by_year = aggregates.by_year;
                        table.apply(row, &record)?;
                        ledger.remove(&title);
                        summary.enriched += 1;
                        tracing::info!(title = %title, "Record enriched");
                    }
                    RecordOutcome::NotFound => {
                        ledger.insert(&title);
                        summary.not_found += 1;
                        tracing::info!(title = %title, "No acceptable match, ledger updated");
                    }
                    RecordOutcome::Pending => {
                        summary.still_pending += 1;
                        tracing::warn!(title = %title, "Record left pending for a later run");
                    }
                }
            }

            table.save()?;
            ledger.save()?;
            tracing::debug!(batch = batch_index + 1, "Checkpoint written");

            if batch_index + 1 < total_batches && !self.options.batch_pause.is_zero() {
                tokio::time::sleep(self.options.batch_pause).await;
            }
        }

        tracing::info!(
            table = %table.path().display(),
            processed = summary.processed,
            enriched = summary.enriched,
            not_found = summary.not_found,
            still_pending = summary.still_pending,
            "Enrichment run finished"
        );

        Ok(summary)
    }

    fn pending_rows(&self, table: &RecordTable, ledger: &NotFoundLedger) -> Vec<(usize, String)> {
        let pending = table.pending_rows();
        match self.options.scope {
            EnrichmentScope::AllPending => pending,
            EnrichmentScope::LedgerOnly => pending
                .into_iter()
                .filter(|(_, title)| ledger.contains(title))
                .collect(),
        }
    }
}

/// Resolve one title and, if matched, aggregate its citations
async fn enrich_record<P: BibliographicProvider>(
    provider: &P,
    catalog: &VenueCatalog,
    retry: &RetryPolicy,
    title: &str,
) -> RecordOutcome {
    match resolver::resolve(provider, retry, title).await {
        ResolveOutcome::NoMatch => RecordOutcome::NotFound,
        ResolveOutcome::Unavailable => RecordOutcome::Pending,
        ResolveOutcome::Matched { paper_id, .. } => {
            match aggregator::aggregate(provider, catalog, retry, &paper_id).await {
                Ok(aggregates) => RecordOutcome::Enriched {
                    paper_id,
                    aggregates,
                },
                Err(err) => {
                    // Partial aggregates are discarded; the record may be
                    // re-resolved redundantly on the next run.
                    tracing::warn!(
                        title = %title,
                        paper_id = %paper_id,
                        error = %err,
                        "Aggregation failed, record stays pending"
                    );
                    RecordOutcome::Pending
                }
            }
        }
    }
}
