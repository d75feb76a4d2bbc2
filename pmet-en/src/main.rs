//! pmet-en - Bibliometric Enrichment
//!
//! Enriches datasets of paper titles with citation statistics (total count,
//! top-venue counts, per-year histogram) from external bibliographic
//! services, and optionally assigns research categories through an LLM
//! endpoint.
//!
//! The process exits successfully after handling every available file;
//! per-record failures are reported through the not-found ledgers and the
//! progress log, not through the exit code.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pmet_common::config::{self, TomlConfig};
use pmet_en::models::venue::VenueCatalog;
use pmet_en::services::{
    BibliographicProvider, ClassifierOptions, EnrichmentOptions, EnrichmentOrchestrator,
    EnrichmentScope, OpenAlexClient, RunSummary, SemanticScholarClient, TopicClassifier,
};
use pmet_en::store::{self, NotFoundLedger, RecordTable};
use pmet_en::utils::retry::RetryPolicy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for pmet-en
#[derive(Parser, Debug)]
#[command(name = "pmet-en")]
#[command(about = "Bibliometric enrichment for paper-title datasets")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "PMET_CONFIG")]
    config: Option<PathBuf>,

    /// Folder containing the record tables
    #[arg(short, long, env = "PMET_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve titles and aggregate citation statistics
    Enrich {
        /// Bibliographic provider to query
        #[arg(long, value_enum, default_value_t = ProviderKind::SemanticScholar)]
        provider: ProviderKind,

        /// Process only titles recorded in the not-found ledgers
        #[arg(long)]
        only_not_found: bool,

        /// Records per batch (checkpoint boundary)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Concurrent workers within a batch
        #[arg(long)]
        concurrency: Option<usize>,

        /// Attempts per external call before a record is left pending
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Assign research categories to titles via the configured LLM endpoint
    Classify,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderKind {
    SemanticScholar,
    OpenAlex,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config =
        config::load(args.config.as_deref()).context("Failed to load configuration")?;

    init_logging(&config);

    info!("Starting pmet-en");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let data_folder = config::resolve_data_folder(args.data_folder.clone(), &config);
    info!("Data folder: {}", data_folder.display());

    let tables = store::discover_tables(&data_folder)
        .with_context(|| format!("Failed to list record tables in {}", data_folder.display()))?;
    if tables.is_empty() {
        warn!(folder = %data_folder.display(), "No record tables found, nothing to do");
        return Ok(());
    }
    info!("Record tables: {}", tables.len());

    match args.command {
        Command::Enrich {
            provider,
            only_not_found,
            batch_size,
            concurrency,
            max_attempts,
        } => {
            let options = enrichment_options(
                &config,
                only_not_found,
                batch_size,
                concurrency,
                max_attempts,
            );

            let venues_file = config::resolve_venues_file(&config);
            let catalog = Arc::new(VenueCatalog::load(&venues_file));
            if catalog.is_empty() {
                warn!("Venue catalog is empty, no citation will be classified into a tier");
            }

            let not_found_folder = config::resolve_not_found_folder(&data_folder, &config);
            std::fs::create_dir_all(&not_found_folder).with_context(|| {
                format!("Failed to create {}", not_found_folder.display())
            })?;

            match provider {
                ProviderKind::SemanticScholar => {
                    let client =
                        SemanticScholarClient::new(config.semantic_scholar.api_key.clone())
                            .context("Failed to initialize Semantic Scholar client")?;
                    run_enrichment(Arc::new(client), catalog, options, &tables, &not_found_folder)
                        .await
                }
                ProviderKind::OpenAlex => {
                    let client =
                        OpenAlexClient::new().context("Failed to initialize OpenAlex client")?;
                    run_enrichment(Arc::new(client), catalog, options, &tables, &not_found_folder)
                        .await
                }
            }
        }
        Command::Classify => run_classification(&config, &tables).await,
    }
}

fn init_logging(config: &TomlConfig) {
    let default_filter = format!(
        "pmet_en={level},pmet_common={level}",
        level = config.logging.level
    );

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn enrichment_options(
    config: &TomlConfig,
    only_not_found: bool,
    batch_size: Option<usize>,
    concurrency: Option<usize>,
    max_attempts: Option<u32>,
) -> EnrichmentOptions {
    let defaults = EnrichmentOptions::default();

    EnrichmentOptions {
        batch_size: batch_size
            .unwrap_or(config.enrichment.batch_size)
            .max(1),
        concurrency: concurrency
            .unwrap_or(config.enrichment.concurrency)
            .max(1),
        retry: RetryPolicy::with_max_attempts(
            max_attempts.unwrap_or(config.enrichment.max_attempts).max(1),
        ),
        scope: if only_not_found {
            EnrichmentScope::LedgerOnly
        } else {
            EnrichmentScope::AllPending
        },
        batch_pause: defaults.batch_pause,
    }
}

/// Run the orchestrator over every record table, skipping files that fail
/// to load so one bad dataset never stops the rest
async fn run_enrichment<P: BibliographicProvider>(
    provider: Arc<P>,
    catalog: Arc<VenueCatalog>,
    options: EnrichmentOptions,
    tables: &[PathBuf],
    not_found_folder: &Path,
) -> Result<()> {
    let orchestrator = EnrichmentOrchestrator::new(provider, catalog, options);
    let mut totals = RunSummary::default();

    for table_path in tables {
        info!(file = %table_path.display(), "Processing record table");

        let mut table = match RecordTable::load(table_path) {
            Ok(table) => table,
            Err(err) => {
                error!(file = %table_path.display(), error = %err, "Skipping unreadable table");
                continue;
            }
        };

        let ledger_path = store::ledger_path_for(table_path, not_found_folder);
        let mut ledger = match NotFoundLedger::load(&ledger_path) {
            Ok(ledger) => ledger,
            Err(err) => {
                error!(file = %ledger_path.display(), error = %err, "Skipping table with unreadable ledger");
                continue;
            }
        };

        match orchestrator.run(&mut table, &mut ledger).await {
            Ok(summary) => totals += summary,
            Err(err) => {
                error!(file = %table_path.display(), error = %err, "Enrichment failed for this table");
            }
        }
    }

    info!(
        processed = totals.processed,
        enriched = totals.enriched,
        not_found = totals.not_found,
        still_pending = totals.still_pending,
        "All record tables processed"
    );

    Ok(())
}

async fn run_classification(config: &TomlConfig, tables: &[PathBuf]) -> Result<()> {
    let Some(base_url) = config.classifier.base_url.clone() else {
        bail!("classifier.base_url is not configured");
    };
    let api_key = config
        .classifier
        .api_key
        .clone()
        .or_else(|| std::env::var("PMET_CLASSIFIER_API_KEY").ok());
    let Some(api_key) = api_key else {
        bail!("classifier API key is not configured (classifier.api_key or PMET_CLASSIFIER_API_KEY)");
    };

    let classifier = TopicClassifier::new(ClassifierOptions::new(
        base_url,
        api_key,
        config.classifier.model.clone(),
    ))
    .context("Failed to initialize topic classifier")?;

    for table_path in tables {
        info!(file = %table_path.display(), "Classifying record table");

        let mut table = match RecordTable::load(table_path) {
            Ok(table) => table,
            Err(err) => {
                error!(file = %table_path.display(), error = %err, "Skipping unreadable table");
                continue;
            }
        };

        match classifier.classify_table(&mut table).await {
            Ok(summary) => {
                info!(
                    file = %table_path.display(),
                    pending = summary.pending,
                    classified = summary.classified,
                    unmatched = summary.unmatched,
                    "Table classified"
                );
            }
            Err(err) => {
                error!(file = %table_path.display(), error = %err, "Classification failed for this table");
            }
        }
    }

    Ok(())
}
