// src/config/sheets.rs

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Cell-level conversion applied while a column is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Text is trimmed; numbers are taken to be percentages already.
    #[default]
    None,
    /// A fraction in [0,1], rendered as a percentage with one decimal.
    Percentage,
    /// `Band: ` / `Industry: ` prefixed segment label.
    SegmentLabel,
}

/// One source column and the semantic field it becomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Header text in the sheet; compared after trimming whitespace.
    pub header: String,
    /// Zero-based position the header is expected at, when pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub field: String,
    #[serde(default)]
    pub transform: Transform,
}

impl ColumnSpec {
    pub fn new(header: &str, field: &str, transform: Transform) -> Self {
        Self {
            header: header.to_string(),
            index: None,
            field: field.to_string(),
            transform,
        }
    }

    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

/// Layout of one input sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSchema {
    /// Sheet name in the workbook (or CSV file stem).
    pub name: String,
    /// Stem of the normalized output file.
    pub output_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_rows: Option<usize>,
    pub wave: ColumnSpec,
    pub date_range: ColumnSpec,
    pub segment: ColumnSpec,
    pub metrics: Vec<ColumnSpec>,
    /// Number of metrics the emptiness filter expects per row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_metrics: Option<usize>,
}

impl SheetSchema {
    pub fn tracked_metric_count(&self) -> usize {
        self.tracked_metrics.unwrap_or(self.metrics.len())
    }

    pub fn metric_fields(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.field.clone()).collect()
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |msg: String| PipelineError::Config(format!("sheet '{}': {}", self.name, msg));

        if self.output_name.trim().is_empty() {
            return Err(fail("output_name must not be blank".into()));
        }
        if self.metrics.is_empty() {
            return Err(fail("at least one metric column is required".into()));
        }
        if self.tracked_metric_count() != self.metrics.len() {
            return Err(fail(format!(
                "tracked_metrics is {} but {} metric columns are configured",
                self.tracked_metric_count(),
                self.metrics.len()
            )));
        }
        for spec in [&self.wave, &self.date_range, &self.segment] {
            if spec.transform == Transform::Percentage {
                return Err(fail(format!(
                    "column '{}' is a text column and cannot use the percentage transform",
                    spec.header
                )));
            }
        }
        if self.date_range.transform != Transform::None {
            return Err(fail("the date range column takes no transform".into()));
        }
        for spec in &self.metrics {
            if spec.transform == Transform::SegmentLabel {
                return Err(fail(format!(
                    "metric column '{}' cannot use the segment_label transform",
                    spec.header
                )));
            }
        }

        let mut fields: Vec<&str> = [&self.wave, &self.date_range, &self.segment]
            .into_iter()
            .chain(self.metrics.iter())
            .map(|c| c.field.as_str())
            .collect();
        fields.push(crate::process::types::WAVE_START_DATE_FIELD);
        let total = fields.len();
        fields.sort_unstable();
        fields.dedup();
        if fields.len() != total {
            return Err(fail("field names must be unique within a sheet".into()));
        }
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(fail("field names must not be blank".into()));
        }
        Ok(())
    }
}

fn survey_sheet(
    name: &str,
    output_name: &str,
    first_column: usize,
    metrics: &[(&str, &str)],
) -> SheetSchema {
    SheetSchema {
        name: name.to_string(),
        output_name: output_name.to_string(),
        skip_rows: None,
        wave: ColumnSpec::new("Wave", "wave", Transform::None).at(first_column),
        date_range: ColumnSpec::new("Date", "date", Transform::None).at(first_column + 1),
        segment: ColumnSpec::new("Industry/ Band", "industry_band", Transform::SegmentLabel)
            .at(first_column + 2),
        metrics: metrics
            .iter()
            .map(|(header, field)| ColumnSpec::new(header, field, Transform::Percentage))
            .collect(),
        tracked_metrics: Some(metrics.len()),
    }
}

/// The four time-series sheets of the published survey workbook.
///
/// All but the workforce sheet carry a leading row-number column, so their
/// identifying columns start one position later.
pub fn default_sheets() -> Vec<SheetSchema> {
    vec![
        survey_sheet(
            "TradingStatus_TS",
            "tradingstatus",
            1,
            &[
                ("Has permanently ceased trading", "ts_ceased_trading"),
                ("current and started trading", "ts_current_and_started_trading"),
                ("paused trading", "ts_paused_trading"),
            ],
        ),
        survey_sheet(
            "FinancialPerformance_TS",
            "financialperformance",
            1,
            &[
                ("Turnover has not been affected", "fp_turnover_not_affected"),
                ("Lower turnover", "fp_lower_turnover"),
                ("Higher turnover", "fp_higher_turnover"),
            ],
        ),
        survey_sheet(
            "WorkforceStatus_TS",
            "workforcestatus",
            0,
            &[
                ("On furlough leave", "ws_on_furlough"),
                (
                    "Working at their normal place of work",
                    "ws_working_normal_place_of_work",
                ),
                (
                    "Working remotely instead of at their normal place of work",
                    "ws_wfh",
                ),
            ],
        ),
        survey_sheet(
            "CashFlow_TS",
            "cashflow",
            1,
            &[("3 months or less", "cf_lt_3mths")],
        ),
    ]
}
