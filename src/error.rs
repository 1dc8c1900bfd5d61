use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a pipeline run.
///
/// Join gaps are not errors: a key missing from one sheet is
/// recorded in [`crate::process::merge::MergeReport`] and surfaces as nulls.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("input not found: {}", path.display())]
    MissingInput { path: PathBuf },

    #[error("sheet '{sheet}' not present in workbook")]
    MissingSheet { sheet: String },

    #[error("sheet '{sheet}' row {row}: cannot derive start date from '{text}': {reason}")]
    DateParse {
        sheet: String,
        row: usize,
        text: String,
        reason: String,
    },

    #[error("sheet '{sheet}' column '{column}': {reason}")]
    SchemaMismatch {
        sheet: String,
        column: String,
        reason: String,
    },

    #[error("sheet '{sheet}' row {row} column '{column}': unexpected value '{value}'")]
    InvalidCell {
        sheet: String,
        row: usize,
        column: String,
        value: String,
    },

    #[error("sheet '{sheet}' has more than one row for wave '{wave}', segment '{segment}'")]
    DuplicateKey {
        sheet: String,
        wave: String,
        segment: String,
    },

    #[error("expected {expected} tracked metrics per record, found {found}")]
    MetricCountMismatch { expected: usize, found: usize },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Why a date-range cell could not be turned into a start date.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("missing ' to ' separator")]
    MissingSeparator,

    #[error("more than one ' to ' separator")]
    AmbiguousSeparator,

    #[error("{phrase} phrase has {tokens} tokens, expected 1 to 3")]
    TokenCount { phrase: &'static str, tokens: usize },

    #[error("start month could not be resolved")]
    MissingMonth,

    #[error("start year could not be resolved")]
    MissingYear,

    #[error("unrecognized month name '{0}'")]
    UnknownMonth(String),

    #[error("'{0}' is not a valid day")]
    InvalidDay(String),

    #[error("'{0}' is not a valid year")]
    InvalidYear(String),

    #[error("{day} {month} {year} is not a calendar date")]
    NotACalendarDate { day: u32, month: u32, year: i32 },
}
