// src/config/mod.rs

pub mod sheets;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use crate::error::PipelineError;
use crate::process::types::Percent;

pub use sheets::{default_sheets, ColumnSpec, SheetSchema, Transform};

/// Leading descriptive rows in every sheet of the published workbook.
pub const DEFAULT_SKIP_ROWS: usize = 9;
pub const DEFAULT_MISSING_MARKER: &str = "*";
pub const DEFAULT_MERGED_OUTPUT: &str = "merged_records_w_all_metrics";
/// Threshold used when a thresholded policy is requested without one.
pub const DEFAULT_MAX_EMPTY_FRACTION: f64 = 0.7;

/// Whether a zero value counts toward a record being "empty".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptinessRule {
    /// Null and `0.0` are both uninformative.
    #[default]
    NullOrZero,
    /// Only null is uninformative; `0.0` is a genuine observation.
    NullOnly,
}

impl EmptinessRule {
    pub fn counts_as_empty(self, value: Option<Percent>) -> bool {
        match (self, value) {
            (_, None) => true,
            (EmptinessRule::NullOrZero, Some(v)) => v.is_zero(),
            (EmptinessRule::NullOnly, Some(_)) => false,
        }
    }
}

/// When a segment is dropped by the emptiness filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionPolicy {
    /// Drop a segment only when every one of its waves is empty.
    #[default]
    Strict,
    /// Drop a segment when `waves_empty / waves_total` exceeds the fraction.
    Thresholded { max_empty_fraction: f64 },
}

impl ExclusionPolicy {
    pub fn excludes(&self, waves_empty: usize, waves_total: usize) -> bool {
        if waves_total == 0 {
            return false;
        }
        match *self {
            ExclusionPolicy::Strict => waves_empty == waves_total,
            ExclusionPolicy::Thresholded { max_empty_fraction } => {
                waves_empty as f64 / waves_total as f64 > max_empty_fraction
            }
        }
    }
}

/// What to do with a row whose date range cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateErrorPolicy {
    #[default]
    Abort,
    SkipRow,
}

fn default_skip_rows() -> usize {
    DEFAULT_SKIP_ROWS
}

fn default_missing_marker() -> String {
    DEFAULT_MISSING_MARKER.to_string()
}

fn default_merged_output() -> String {
    DEFAULT_MERGED_OUTPUT.to_string()
}

fn default_true() -> bool {
    true
}

/// Everything a run needs besides the input and output paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rows before the header row, unless a sheet overrides it.
    #[serde(default = "default_skip_rows")]
    pub skip_rows: usize,
    #[serde(default = "default_missing_marker")]
    pub missing_marker: String,
    pub sheets: Vec<SheetSchema>,
    /// Column order of the merged table; empty means sheet order.
    #[serde(default)]
    pub merged_metric_order: Vec<String>,
    #[serde(default = "default_merged_output")]
    pub merged_output_name: String,
    #[serde(default)]
    pub emptiness: EmptinessRule,
    #[serde(default)]
    pub exclusion: ExclusionPolicy,
    #[serde(default)]
    pub on_date_error: DateErrorPolicy,
    /// Also write `<sheet>_filtered.csv` for every normalized sheet.
    #[serde(default = "default_true")]
    pub filter_sheets: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            skip_rows: DEFAULT_SKIP_ROWS,
            missing_marker: default_missing_marker(),
            sheets: default_sheets(),
            merged_metric_order: [
                "ts_current_and_started_trading",
                "ts_paused_trading",
                "ts_ceased_trading",
                "cf_lt_3mths",
                "fp_lower_turnover",
                "fp_turnover_not_affected",
                "fp_higher_turnover",
                "ws_working_normal_place_of_work",
                "ws_wfh",
                "ws_on_furlough",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            merged_output_name: default_merged_output(),
            emptiness: EmptinessRule::default(),
            exclusion: ExclusionPolicy::default(),
            on_date_error: DateErrorPolicy::default(),
            filter_sheets: true,
        }
    }
}

impl PipelineConfig {
    /// Load a YAML config file and check it for consistency.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::MissingInput {
                path: PathBuf::from(path),
            }
            .into());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: PipelineConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("serializing config to YAML")
    }

    pub fn skip_rows_for(&self, sheet: &SheetSchema) -> usize {
        sheet.skip_rows.unwrap_or(self.skip_rows)
    }

    /// Metric fields of the merged table, in output order.
    pub fn merged_fields(&self) -> Vec<String> {
        if self.merged_metric_order.is_empty() {
            self.sheets
                .iter()
                .flat_map(|s| s.metrics.iter().map(|m| m.field.clone()))
                .collect()
        } else {
            self.merged_metric_order.clone()
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.sheets.is_empty() {
            return Err(PipelineError::Config("no sheets configured".into()));
        }
        if self.missing_marker.trim().is_empty() {
            return Err(PipelineError::Config("missing_marker must not be blank".into()));
        }
        if let ExclusionPolicy::Thresholded { max_empty_fraction } = self.exclusion {
            if !(0.0..=1.0).contains(&max_empty_fraction) {
                return Err(PipelineError::Config(format!(
                    "max_empty_fraction {} is outside [0, 1]",
                    max_empty_fraction
                )));
            }
        }

        let mut sheet_names = HashSet::new();
        let mut output_names = HashSet::new();
        let mut fields = HashSet::new();
        for sheet in &self.sheets {
            if !sheet_names.insert(sheet.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "sheet '{}' configured twice",
                    sheet.name
                )));
            }
            if !output_names.insert(sheet.output_name.as_str())
                || sheet.output_name == self.merged_output_name
            {
                return Err(PipelineError::Config(format!(
                    "output name '{}' is used more than once",
                    sheet.output_name
                )));
            }
            sheet.validate()?;
            for metric in &sheet.metrics {
                if !fields.insert(metric.field.as_str()) {
                    return Err(PipelineError::Config(format!(
                        "metric field '{}' is declared by more than one sheet",
                        metric.field
                    )));
                }
            }
        }

        if !self.merged_metric_order.is_empty() {
            let mut seen = HashSet::new();
            for field in &self.merged_metric_order {
                if !fields.contains(field.as_str()) {
                    return Err(PipelineError::Config(format!(
                        "merged_metric_order names unknown field '{}'",
                        field
                    )));
                }
                if !seen.insert(field.as_str()) {
                    return Err(PipelineError::Config(format!(
                        "merged_metric_order lists '{}' twice",
                        field
                    )));
                }
            }
            if seen.len() != fields.len() {
                return Err(PipelineError::Config(format!(
                    "merged_metric_order lists {} of {} metric fields",
                    seen.len(),
                    fields.len()
                )));
            }
        }
        Ok(())
    }
}
