//! CSV-backed record table
//!
//! One row per paper title. The pipeline owns a fixed set of columns and
//! preserves every other column it finds in the file, so datasets can carry
//! arbitrary extra fields through an enrichment run untouched.
//!
//! Saves go through a temporary sibling file and an atomic rename, so a
//! crash between checkpoints never corrupts previously committed data.

use crate::models::record::{histogram_years, PaperRecord};
use pmet_common::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Column holding the record key
pub const TITLE_COLUMN: &str = "title";

/// Columns owned by the enrichment pipeline, histogram years aside
const OWNED_COLUMNS: &[&str] = &[
    "paperId",
    "citationCount",
    "top_conf_citations",
    "top_journal_citations",
];

/// In-memory record table bound to its CSV file
pub struct RecordTable {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    columns: HashMap<String, usize>,
    titles: HashMap<String, usize>,
}

impl RecordTable {
    /// Load a table, requiring a `title` column and appending any missing
    /// pipeline-owned columns
    pub fn load(path: &Path) -> Result<RecordTable> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for row in reader.records() {
            let row = row?;
            let mut cells: Vec<String> = row.iter().map(str::to_string).collect();
            // pad short rows so every row spans the full header
            cells.resize(headers.len(), String::new());
            rows.push(cells);
        }

        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(position, name)| (name.clone(), position))
            .collect();

        if !columns.contains_key(TITLE_COLUMN) {
            return Err(Error::InvalidInput(format!(
                "{}: missing required '{}' column",
                path.display(),
                TITLE_COLUMN
            )));
        }

        let mut table = RecordTable {
            path: path.to_path_buf(),
            headers,
            rows,
            columns,
            titles: HashMap::new(),
        };

        for column in owned_columns() {
            table.ensure_column(&column);
        }
        table.rebuild_title_index();

        Ok(table)
    }

    /// File this table loads from and saves to
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a column if the table does not already carry it
    pub fn ensure_column(&mut self, name: &str) {
        if self.columns.contains_key(name) {
            return;
        }
        self.columns.insert(name.to_string(), self.headers.len());
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
    }

    fn rebuild_title_index(&mut self) {
        let titles: HashMap<String, usize> = (0..self.rows.len())
            .filter_map(|row| {
                let title = self.raw_cell(row, TITLE_COLUMN).trim();
                if title.is_empty() {
                    None
                } else {
                    Some((title.to_string(), row))
                }
            })
            .collect();
        self.titles = titles;
    }

    fn raw_cell(&self, row: usize, column: &str) -> &str {
        self.columns
            .get(column)
            .and_then(|&position| self.rows.get(row).and_then(|cells| cells.get(position)))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Read a cell; empty string when the row or column is absent
    pub fn cell(&self, row: usize, column: &str) -> &str {
        self.raw_cell(row, column)
    }

    /// Write a cell; unknown columns and out-of-range rows are ignored
    pub fn set_cell(&mut self, row: usize, column: &str, value: &str) {
        if let Some(&position) = self.columns.get(column) {
            if let Some(cells) = self.rows.get_mut(row) {
                if let Some(cell) = cells.get_mut(position) {
                    *cell = value.to_string();
                }
            }
        }
    }

    /// Trimmed title of a row
    pub fn title(&self, row: usize) -> &str {
        self.raw_cell(row, TITLE_COLUMN).trim()
    }

    /// Direct key lookup from a trimmed title to its row
    pub fn row_for_title(&self, title: &str) -> Option<usize> {
        self.titles.get(title.trim()).copied()
    }

    /// Parse a row into a typed record
    pub fn record(&self, row: usize) -> Result<PaperRecord> {
        if row >= self.rows.len() {
            return Err(Error::Internal(format!(
                "row {} out of bounds ({} rows)",
                row,
                self.rows.len()
            )));
        }

        let mut record = PaperRecord::new(self.title(row));

        let paper_id = self.raw_cell(row, "paperId");
        if !paper_id.is_empty() {
            record.paper_id = Some(paper_id.to_string());
        }
        record.citation_count = self.raw_cell(row, "citationCount").parse().ok();
        record.top_conference_citations =
            self.raw_cell(row, "top_conf_citations").parse().unwrap_or(0);
        record.top_journal_citations = self
            .raw_cell(row, "top_journal_citations")
            .parse()
            .unwrap_or(0);

        for year in histogram_years() {
            let count = self
                .raw_cell(row, &format!("citations_{}", year))
                .parse()
                .unwrap_or(0);
            record.citations_by_year.insert(year, count);
        }

        Ok(record)
    }

    /// Write a typed record back into its row's pipeline-owned cells
    pub fn apply(&mut self, row: usize, record: &PaperRecord) -> Result<()> {
        if row >= self.rows.len() {
            return Err(Error::Internal(format!(
                "row {} out of bounds ({} rows)",
                row,
                self.rows.len()
            )));
        }

        let paper_id = record.paper_id.clone().unwrap_or_default();
        self.set_cell(row, "paperId", &paper_id);
        let citation_count = record
            .citation_count
            .map(|count| count.to_string())
            .unwrap_or_default();
        self.set_cell(row, "citationCount", &citation_count);
        self.set_cell(
            row,
            "top_conf_citations",
            &record.top_conference_citations.to_string(),
        );
        self.set_cell(
            row,
            "top_journal_citations",
            &record.top_journal_citations.to_string(),
        );

        for year in histogram_years() {
            let count = record.citations_by_year.get(&year).copied().unwrap_or(0);
            self.set_cell(row, &format!("citations_{}", year), &count.to_string());
        }

        Ok(())
    }

    /// Rows eligible for enrichment: a title is present and either the
    /// identifier or the citation count is still missing
    pub fn pending_rows(&self) -> Vec<(usize, String)> {
        (0..self.rows.len())
            .filter_map(|row| {
                let title = self.title(row);
                if title.is_empty() {
                    return None;
                }
                let resolved = !self.raw_cell(row, "paperId").is_empty()
                    && !self.raw_cell(row, "citationCount").is_empty();
                if resolved {
                    None
                } else {
                    Some((row, title.to_string()))
                }
            })
            .collect()
    }

    /// Persist the table; atomic from the caller's perspective
    pub fn save(&self) -> Result<()> {
        let tmp_path = self.path.with_extension("csv.tmp");

        {
            let mut writer = csv::Writer::from_path(&tmp_path)?;
            writer.write_record(&self.headers)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }

        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn owned_columns() -> impl Iterator<Item = String> {
    OWNED_COLUMNS
        .iter()
        .map(|column| column.to_string())
        .chain(histogram_years().map(|year| format!("citations_{}", year)))
}
