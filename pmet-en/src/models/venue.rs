//! Venue tier classification
//!
//! Maps a citing work's venue name to a tier via case-insensitive substring
//! containment against the configured venue lists. Conferences are checked
//! before journals, so a name matching both lists counts as a conference.

use serde::Deserialize;
use std::path::Path;

/// Tier of a citing work's venue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueTier {
    TopConference,
    TopJournal,
    /// No configured venue substring matched (or the name was absent)
    Unranked,
}

/// Configured venue substrings, lower-cased at construction
///
/// Loaded once per run; immutable thereafter. An absent or unreadable
/// catalog document yields empty sets, meaning nothing is ever classified
/// into a tier.
#[derive(Debug, Clone, Default)]
pub struct VenueCatalog {
    top_conferences: Vec<String>,
    top_journals: Vec<String>,
}

/// On-disk shape of the venue catalog document
#[derive(Debug, Deserialize)]
struct VenueFile {
    #[serde(default)]
    top_conferences: Vec<String>,
    #[serde(default)]
    top_journals: Vec<String>,
}

impl VenueCatalog {
    /// Build a catalog from raw venue name lists
    ///
    /// Entries are lower-cased; empty entries are discarded (an empty
    /// substring would match every venue).
    pub fn new(top_conferences: Vec<String>, top_journals: Vec<String>) -> Self {
        let normalize = |names: Vec<String>| -> Vec<String> {
            names
                .into_iter()
                .map(|name| name.trim().to_lowercase())
                .filter(|name| !name.is_empty())
                .collect()
        };

        Self {
            top_conferences: normalize(top_conferences),
            top_journals: normalize(top_journals),
        }
    }

    /// Load the catalog from a TOML document
    ///
    /// Absence is non-fatal: a missing or malformed document is logged and
    /// yields an empty catalog.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    file = %path.display(),
                    error = %e,
                    "Venue catalog not readable, no venues will be tiered"
                );
                return Self::default();
            }
        };

        match toml::from_str::<VenueFile>(&text) {
            Ok(file) => {
                let catalog = Self::new(file.top_conferences, file.top_journals);
                tracing::info!(
                    file = %path.display(),
                    top_conferences = catalog.top_conferences.len(),
                    top_journals = catalog.top_journals.len(),
                    "Venue catalog loaded"
                );
                catalog
            }
            Err(e) => {
                tracing::warn!(
                    file = %path.display(),
                    error = %e,
                    "Venue catalog malformed, no venues will be tiered"
                );
                Self::default()
            }
        }
    }

    /// Classify a venue name into a tier
    pub fn classify(&self, venue: Option<&str>) -> VenueTier {
        let name = match venue {
            Some(name) if !name.is_empty() => name.to_lowercase(),
            _ => return VenueTier::Unranked,
        };

        if self.top_conferences.iter().any(|v| name.contains(v.as_str())) {
            VenueTier::TopConference
        } else if self.top_journals.iter().any(|v| name.contains(v.as_str())) {
            VenueTier::TopJournal
        } else {
            VenueTier::Unranked
        }
    }

    /// Whether both venue lists are empty
    pub fn is_empty(&self) -> bool {
        self.top_conferences.is_empty() && self.top_journals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> VenueCatalog {
        VenueCatalog::new(
            vec!["NeurIPS".to_string(), "ICML".to_string()],
            vec!["Nature".to_string(), "JMLR".to_string()],
        )
    }

    #[test]
    fn classifies_by_case_insensitive_substring() {
        let catalog = catalog();
        assert_eq!(
            catalog.classify(Some("Proceedings of NeurIPS 2023")),
            VenueTier::TopConference
        );
        assert_eq!(
            catalog.classify(Some("nature machine intelligence")),
            VenueTier::TopJournal
        );
        assert_eq!(
            catalog.classify(Some("Workshop on Obscure Topics")),
            VenueTier::Unranked
        );
    }

    #[test]
    fn conference_wins_over_journal() {
        let catalog = VenueCatalog::new(
            vec!["transactions".to_string()],
            vec!["transactions".to_string()],
        );
        assert_eq!(
            catalog.classify(Some("IEEE Transactions on Something")),
            VenueTier::TopConference
        );
    }

    #[test]
    fn absent_or_empty_venue_is_unranked() {
        let catalog = catalog();
        assert_eq!(catalog.classify(None), VenueTier::Unranked);
        assert_eq!(catalog.classify(Some("")), VenueTier::Unranked);
    }

    #[test]
    fn empty_entries_are_discarded() {
        let catalog = VenueCatalog::new(vec!["".to_string(), "  ".to_string()], vec![]);
        assert!(catalog.is_empty());
        assert_eq!(catalog.classify(Some("anything")), VenueTier::Unranked);
    }

    #[test]
    fn loads_from_toml_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("venues.toml");
        std::fs::write(
            &path,
            "top_conferences = [\"CVPR\"]\ntop_journals = [\"TPAMI\"]\n",
        )
        .unwrap();

        let catalog = VenueCatalog::load(&path);
        assert_eq!(catalog.classify(Some("CVPR 2024")), VenueTier::TopConference);
        assert_eq!(catalog.classify(Some("TPAMI")), VenueTier::TopJournal);
    }

    #[test]
    fn missing_document_yields_empty_catalog() {
        let catalog = VenueCatalog::load(Path::new("/nonexistent/venues.toml"));
        assert!(catalog.is_empty());
    }
}
