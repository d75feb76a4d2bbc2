//! Checkpointed persistence for record tables and not-found ledgers

pub mod ledger;
pub mod record_table;

pub use ledger::NotFoundLedger;
pub use record_table::RecordTable;

use pmet_common::Result;
use std::path::{Path, PathBuf};

/// List the record tables in a data folder, sorted by file name
pub fn discover_tables(data_folder: &Path) -> Result<Vec<PathBuf>> {
    let mut tables = Vec::new();

    for entry in std::fs::read_dir(data_folder)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("csv") {
            tables.push(path);
        }
    }

    tables.sort();
    Ok(tables)
}

/// Ledger path paired with a record table by file stem
pub fn ledger_path_for(table_path: &Path, not_found_folder: &Path) -> PathBuf {
    let stem = table_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("records");
    not_found_folder.join(format!("{}.txt", stem))
}
