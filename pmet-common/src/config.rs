//! Configuration loading and data folder resolution
//!
//! Bootstrap configuration comes from an optional TOML file; every setting
//! has a built-in default, so a missing file simply means defaults apply.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--data-folder`, `--config`)
//! 2. Environment variables (`PMET_DATA_FOLDER`, `PMET_CONFIG`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! Command-line and environment resolution for the two path arguments is
//! handled by the CLI layer; the functions here take the already-resolved
//! argument value and continue the chain.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Bootstrap configuration loaded from the TOML config file
///
/// These settings cannot change during a run. Everything is optional;
/// `TomlConfig::default()` is a fully usable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Folder containing the record tables (one CSV per dataset)
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// Folder containing the paired not-found ledgers
    ///
    /// Default: a `data-false` folder next to the data folder.
    #[serde(default)]
    pub not_found_folder: Option<PathBuf>,

    /// Venue catalog document (top conferences / top journals)
    #[serde(default)]
    pub venues_file: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Enrichment batch and retry tuning
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Semantic Scholar provider settings
    #[serde(default)]
    pub semantic_scholar: SemanticScholarConfig,

    /// LLM topic classifier settings
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Enrichment batch and retry tuning
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Records per batch; the table and ledger are checkpointed at every
    /// batch boundary
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent workers within a batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts per external call before the record is left pending
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Semantic Scholar provider settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SemanticScholarConfig {
    /// Optional API key; raises the provider's rate limit
    #[serde(default)]
    pub api_key: Option<String>,
}

/// LLM topic classifier settings
///
/// The classifier talks to any OpenAI-compatible chat-completion endpoint.
/// `base_url` and an API key are required to run the `classify` command.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Endpoint base URL (e.g. `https://api.example.com/v1`)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer API key; `PMET_CLASSIFIER_API_KEY` overrides
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name requested from the endpoint
    #[serde(default = "default_classifier_model")]
    pub model: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: default_classifier_model(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_concurrency() -> usize {
    3
}

fn default_max_attempts() -> u32 {
    5
}

fn default_classifier_model() -> String {
    "deepseek-v3".to_string()
}

/// Load the bootstrap configuration
///
/// An explicitly requested file must exist and parse; the per-user default
/// location (`<config dir>/pmet/pmet.toml`) is used when present, and a
/// fully defaulted configuration otherwise.
pub fn load(cli_path: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = cli_path {
        return read_config(path);
    }

    if let Some(path) = default_config_path() {
        if path.exists() {
            return read_config(&path);
        }
    }

    tracing::debug!("No configuration file found, using built-in defaults");
    Ok(TomlConfig::default())
}

/// Per-user default config file path
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pmet").join("pmet.toml"))
}

fn read_config(path: &Path) -> Result<TomlConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Resolve the data folder: CLI/environment value, then config file,
/// then `./data`
pub fn resolve_data_folder(cli_arg: Option<PathBuf>, config: &TomlConfig) -> PathBuf {
    cli_arg
        .or_else(|| config.data_folder.clone())
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Resolve the not-found ledger folder: config file value, then a
/// `data-false` folder next to the data folder
pub fn resolve_not_found_folder(data_folder: &Path, config: &TomlConfig) -> PathBuf {
    if let Some(folder) = &config.not_found_folder {
        return folder.clone();
    }
    match data_folder.parent() {
        Some(parent) => parent.join("data-false"),
        None => PathBuf::from("data-false"),
    }
}

/// Resolve the venue catalog document: config file value, then
/// `config/venues.toml`
pub fn resolve_venues_file(config: &TomlConfig) -> PathBuf {
    config
        .venues_file
        .clone()
        .unwrap_or_else(|| PathBuf::from("config").join("venues.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.enrichment.batch_size, 10);
        assert_eq!(config.enrichment.concurrency, 3);
        assert_eq!(config.enrichment.max_attempts, 5);
        assert!(config.data_folder.is_none());
        assert!(config.semantic_scholar.api_key.is_none());
        assert!(config.classifier.base_url.is_none());
    }

    #[test]
    fn full_config_parses() {
        let config: TomlConfig = toml::from_str(
            r#"
            data_folder = "/srv/pmet/data"
            not_found_folder = "/srv/pmet/data-false"
            venues_file = "/srv/pmet/venues.toml"

            [logging]
            level = "debug"

            [enrichment]
            batch_size = 20
            concurrency = 5
            max_attempts = 3

            [semantic_scholar]
            api_key = "ss-key"

            [classifier]
            base_url = "https://llm.example.com/v1"
            api_key = "llm-key"
            model = "test-model"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_folder.as_deref(), Some(Path::new("/srv/pmet/data")));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.enrichment.batch_size, 20);
        assert_eq!(config.enrichment.concurrency, 5);
        assert_eq!(config.enrichment.max_attempts, 3);
        assert_eq!(config.semantic_scholar.api_key.as_deref(), Some("ss-key"));
        assert_eq!(
            config.classifier.base_url.as_deref(),
            Some("https://llm.example.com/v1")
        );
        assert_eq!(config.classifier.model, "test-model");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [enrichment]
            concurrency = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.enrichment.concurrency, 8);
        assert_eq!(config.enrichment.batch_size, 10);
        assert_eq!(config.enrichment.max_attempts, 5);
    }

    #[test]
    fn data_folder_resolution_chain() {
        let mut config = TomlConfig::default();
        assert_eq!(
            resolve_data_folder(None, &config),
            PathBuf::from("data")
        );

        config.data_folder = Some(PathBuf::from("/from/config"));
        assert_eq!(
            resolve_data_folder(None, &config),
            PathBuf::from("/from/config")
        );

        assert_eq!(
            resolve_data_folder(Some(PathBuf::from("/from/cli")), &config),
            PathBuf::from("/from/cli")
        );
    }

    #[test]
    fn not_found_folder_defaults_next_to_data() {
        let config = TomlConfig::default();
        assert_eq!(
            resolve_not_found_folder(Path::new("/srv/pmet/data"), &config),
            PathBuf::from("/srv/pmet/data-false")
        );
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let result = load(Some(Path::new("/nonexistent/pmet.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pmet.toml");
        std::fs::write(&path, "[logging]\nlevel = \"trace\"\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.logging.level, "trace");
    }
}
