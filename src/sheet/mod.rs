// src/sheet/mod.rs

pub mod csv_dir;
pub mod raw_table;
pub mod workbook;

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

pub use csv_dir::CsvDirSource;
pub use raw_table::{RawCell, RawSheet};
pub use workbook::WorkbookSource;

/// Anything that can hand out named sheets as rows of cells.
pub trait SheetSource {
    fn sheet_names(&self) -> Vec<String>;

    /// Read the whole of sheet `name`.
    fn read_sheet(&mut self, name: &str) -> Result<RawSheet>;
}

/// Open `path` as a workbook, or as a directory of per-sheet CSV exports.
pub fn open_source<P: AsRef<Path>>(path: P) -> Result<Box<dyn SheetSource>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PipelineError::MissingInput {
            path: PathBuf::from(path),
        }
        .into());
    }
    if path.is_dir() {
        Ok(Box::new(CsvDirSource::new(path)))
    } else {
        Ok(Box::new(WorkbookSource::open(path)?))
    }
}
