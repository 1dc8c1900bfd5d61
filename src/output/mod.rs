// src/output/mod.rs

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::process::date_parser::format_wave_date;
use crate::process::types::{MergedRecord, NormalizedFields, NormalizedRow, Percent};

const STAGING_PREFIX: &str = ".bicsmerge-staging-";

fn pct_field(value: Option<Percent>) -> String {
    value.map(|p| p.to_string()).unwrap_or_default()
}

/// Collects output files in a hidden directory next to their destination.
///
/// Nothing lands in `out_dir` until [`OutputStage::publish`]; dropping the
/// stage unpublished removes everything written so far.
pub struct OutputStage {
    out_dir: PathBuf,
    staging: TempDir,
    files: Vec<String>,
}

impl OutputStage {
    pub fn new<P: AsRef<Path>>(out_dir: P) -> Result<Self> {
        let out_dir = out_dir.as_ref().to_path_buf();
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating output dir {}", out_dir.display()))?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&out_dir)
            .with_context(|| format!("creating staging dir in {}", out_dir.display()))?;
        debug!(staging = %staging.path().display(), "staging outputs");
        Ok(Self {
            out_dir,
            staging,
            files: Vec::new(),
        })
    }

    pub fn staging_path(&self) -> &Path {
        self.staging.path()
    }

    fn claim(&mut self, file_name: String) -> PathBuf {
        let path = self.staging.path().join(&file_name);
        if !self.files.contains(&file_name) {
            self.files.push(file_name);
        }
        path
    }

    fn csv_writer(&mut self, file_name: String) -> Result<(csv::Writer<File>, PathBuf)> {
        let path = self.claim(file_name);
        let writer = WriterBuilder::new()
            .from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        Ok((writer, path))
    }

    /// `<name>.csv` with columns wave, date, wave_start_date, segment, metrics...
    pub fn write_normalized_rows(
        &mut self,
        name: &str,
        fields: &NormalizedFields,
        rows: &[NormalizedRow],
    ) -> Result<PathBuf> {
        let (mut wtr, path) = self.csv_writer(format!("{}.csv", name))?;
        wtr.write_record(fields.header())?;
        for row in rows {
            let mut record = vec![
                row.wave.clone(),
                row.date_range.clone(),
                format_wave_date(&row.wave_start_date),
                row.segment.clone(),
            ];
            record.extend(row.metrics.iter().map(|m| pct_field(*m)));
            wtr.write_record(&record)
                .with_context(|| format!("writing {}", path.display()))?;
        }
        wtr.flush()?;
        info!(file = %name, rows = rows.len(), "wrote table");
        Ok(path)
    }

    /// `<name>.csv` with columns wave, segment, metrics...
    pub fn write_merged(
        &mut self,
        name: &str,
        key_fields: (&str, &str),
        metric_fields: &[String],
        records: &[MergedRecord],
    ) -> Result<PathBuf> {
        let (mut wtr, path) = self.csv_writer(format!("{}.csv", name))?;
        let mut header = vec![key_fields.0, key_fields.1];
        header.extend(metric_fields.iter().map(String::as_str));
        wtr.write_record(&header)?;
        for record in records {
            let mut row = vec![record.key.wave.clone(), record.key.segment.clone()];
            row.extend(record.metrics.iter().map(|m| pct_field(*m)));
            wtr.write_record(&row)
                .with_context(|| format!("writing {}", path.display()))?;
        }
        wtr.flush()?;
        info!(file = %name, rows = records.len(), "wrote table");
        Ok(path)
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn write_json<T: Serialize>(&mut self, file_name: &str, value: &T) -> Result<PathBuf> {
        let path = self.claim(file_name.to_string());
        let mut file =
            File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(&mut file, value)
            .with_context(|| format!("serializing {}", file_name))?;
        file.write_all(b"\n")?;
        Ok(path)
    }

    /// Move every staged file into the output directory.
    pub fn publish(self) -> Result<Vec<PathBuf>> {
        let mut published = Vec::with_capacity(self.files.len());
        for name in &self.files {
            let from = self.staging.path().join(name);
            let to = self.out_dir.join(name);
            fs::rename(&from, &to).with_context(|| {
                format!("renaming {} -> {}", from.display(), to.display())
            })?;
            published.push(to);
        }
        info!(
            files = published.len(),
            out_dir = %self.out_dir.display(),
            "published outputs"
        );
        // staging dir is removed when `self.staging` drops
        Ok(published)
    }
}
