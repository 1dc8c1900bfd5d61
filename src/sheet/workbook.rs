use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use tracing::debug;

use super::{RawCell, RawSheet, SheetSource};
use crate::error::PipelineError;

/// An `.xlsx`/`.xls`/`.ods` workbook opened through calamine.
pub struct WorkbookSource {
    path: PathBuf,
    workbook: Sheets<BufReader<File>>,
}

impl WorkbookSource {
    pub fn open(path: &Path) -> Result<Self> {
        let workbook = open_workbook_auto(path)
            .with_context(|| format!("opening workbook {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            workbook,
        })
    }
}

impl SheetSource for WorkbookSource {
    fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn read_sheet(&mut self, name: &str) -> Result<RawSheet> {
        if !self.sheet_names().iter().any(|n| n == name) {
            return Err(PipelineError::MissingSheet {
                sheet: name.to_string(),
            }
            .into());
        }
        let range = self
            .workbook
            .worksheet_range(name)
            .with_context(|| format!("reading sheet '{}' of {}", name, self.path.display()))?;
        let rows = range_to_rows(&range);
        debug!(sheet = name, rows = rows.len(), "read workbook sheet");
        Ok(RawSheet::new(name, rows))
    }
}

/// Calamine ranges start at the first used cell; pad them back to A1 so
/// configured row and column positions stay absolute.
fn range_to_rows(range: &Range<Data>) -> Vec<Vec<RawCell>> {
    let (row_offset, col_offset) = match range.start() {
        Some((r, c)) => (r as usize, c as usize),
        None => return Vec::new(),
    };

    let mut rows: Vec<Vec<RawCell>> = vec![Vec::new(); row_offset];
    for data_row in range.rows() {
        let mut row = vec![RawCell::Empty; col_offset];
        row.extend(data_row.iter().map(to_raw_cell));
        rows.push(row);
    }
    rows
}

fn to_raw_cell(data: &Data) -> RawCell {
    match data {
        Data::Empty => RawCell::Empty,
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Float(f) => RawCell::Number(*f),
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Bool(b) => RawCell::Text(b.to_string()),
        Data::DateTime(dt) => RawCell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::Error(e) => RawCell::Text(e.to_string()),
    }
}
