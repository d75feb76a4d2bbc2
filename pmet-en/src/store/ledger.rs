//! Not-found ledger
//!
//! One title per line, paired with a record table by file stem. A title
//! lands here only on an authoritative non-match from the provider; retry
//! exhaustion never writes an entry. Titles are removed once a later run
//! resolves them.

use pmet_common::Result;
use std::path::{Path, PathBuf};

/// Insertion-ordered, deduplicated set of unresolved titles
pub struct NotFoundLedger {
    path: PathBuf,
    titles: Vec<String>,
}

impl NotFoundLedger {
    /// Load a ledger; a missing file is an empty ledger
    pub fn load(path: &Path) -> Result<NotFoundLedger> {
        let titles = if path.exists() {
            std::fs::read_to_string(path)?
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };

        Ok(NotFoundLedger {
            path: path.to_path_buf(),
            titles,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, title: &str) -> bool {
        let title = title.trim();
        self.titles.iter().any(|t| t == title)
    }

    /// Record a title, keeping earlier entries in place
    pub fn insert(&mut self, title: &str) {
        let title = title.trim();
        if title.is_empty() || self.contains(title) {
            return;
        }
        self.titles.push(title.to_string());
    }

    /// Drop a title that has since resolved
    pub fn remove(&mut self, title: &str) {
        let title = title.trim();
        self.titles.retain(|t| t != title);
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Persist the ledger; atomic from the caller's perspective
    pub fn save(&self) -> Result<()> {
        let tmp_path = self.path.with_extension("txt.tmp");

        let mut content = self.titles.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = NotFoundLedger::load(&dir.path().join("t.txt")).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn insert_deduplicates_and_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = NotFoundLedger::load(&dir.path().join("t.txt")).unwrap();

        ledger.insert("First Paper");
        ledger.insert("Second Paper");
        ledger.insert("First Paper");
        ledger.insert("  ");

        assert_eq!(ledger.titles(), &["First Paper", "Second Paper"]);
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");

        let mut ledger = NotFoundLedger::load(&path).unwrap();
        ledger.insert("First Paper");
        ledger.insert("Second Paper");
        ledger.save().unwrap();

        let reloaded = NotFoundLedger::load(&path).unwrap();
        assert_eq!(reloaded.titles(), &["First Paper", "Second Paper"]);
        assert!(!path.with_extension("txt.tmp").exists());
    }

    #[test]
    fn remove_drops_resolved_title() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        std::fs::write(&path, "First Paper\nSecond Paper\n\n").unwrap();

        let mut ledger = NotFoundLedger::load(&path).unwrap();
        assert_eq!(ledger.len(), 2);

        ledger.remove("First Paper");
        assert!(!ledger.contains("First Paper"));
        assert!(ledger.contains("Second Paper"));

        ledger.save().unwrap();
        let reloaded = NotFoundLedger::load(&path).unwrap();
        assert_eq!(reloaded.titles(), &["Second Paper"]);
    }
}
