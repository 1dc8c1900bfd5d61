// src/process/mod.rs
pub mod date_parser;
pub mod filter;
pub mod merge;
pub mod normalize;
pub mod types;
pub mod utils;
pub mod validate;

pub use filter::{EmptinessFilter, FilterOutcome, SegmentEmptinessStat};
pub use merge::{merge_tables, JoinGap, MergeReport};
pub use normalize::{normalize_sheet, NormalizeOptions};
pub use types::{
    MergeKey, MergedRecord, MergedTable, MetricRecord, NormalizedRow, NormalizedTable, Percent,
};
pub use validate::{validate_metrics, ValidationReport};
