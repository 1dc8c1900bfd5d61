use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use super::{RawCell, RawSheet, SheetSource};
use crate::error::PipelineError;

/// Sheets exported one CSV file each, `<dir>/<sheet name>.csv`.
///
/// Fully blank lines are dropped by the reader, so exports must keep
/// descriptive rows as delimiter-only lines for row positions to hold.
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn sheet_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", name))
    }
}

impl SheetSource for CsvDirSource {
    fn sheet_names(&self) -> Vec<String> {
        let mut names: Vec<String> = match fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.extension().map_or(false, |ext| ext == "csv"))
                .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    fn read_sheet(&mut self, name: &str) -> Result<RawSheet> {
        let path = self.sheet_path(name);
        if !path.exists() {
            return Err(PipelineError::MissingInput { path }.into());
        }
        read_csv_sheet(name, &path)
    }
}

fn read_csv_sheet(name: &str, path: &Path) -> Result<RawSheet> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // descriptive rows are shorter than data rows
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record =
            result.with_context(|| format!("CSV parse error in {} at record {}", path.display(), idx))?;
        rows.push(record.iter().map(RawCell::from_text).collect());
    }
    debug!(sheet = name, rows = rows.len(), "read csv sheet");
    Ok(RawSheet::new(name, rows))
}
