// src/pipeline.rs

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fmt,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::config::PipelineConfig;
use crate::process::{
    merge_tables, normalize_sheet, validate_metrics, EmptinessFilter, JoinGap, NormalizeOptions,
    SegmentEmptinessStat, ValidationReport,
};
use crate::{output::OutputStage, sheet};

pub const REPORT_FILE: &str = "validation_report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Read,
    Normalize,
    Merge,
    Filter,
    Validate,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read => "read",
            Stage::Normalize => "normalize",
            Stage::Merge => "merge",
            Stage::Filter => "filter",
            Stage::Validate => "validate",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

fn failed(stage: Stage) -> String {
    format!("{} stage failed", stage)
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetExclusions {
    pub sheet: String,
    pub excluded: Vec<SegmentEmptinessStat>,
}

/// Machine-readable summary written next to the tables.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub validation: ValidationReport,
    pub excluded_segments: Vec<SegmentEmptinessStat>,
    pub sheet_exclusions: Vec<SheetExclusions>,
    pub join_gaps: usize,
    pub skipped_rows: usize,
}

#[derive(Debug)]
pub struct RunSummary {
    pub outputs: Vec<PathBuf>,
    pub report: RunReport,
    /// Per-key detail behind `report.join_gaps`.
    pub gaps: Vec<JoinGap>,
}

/// Read → normalize → merge → filter → validate, then publish every output.
///
/// Outputs are staged inside `out_dir` and only moved into place once every
/// stage has succeeded.
#[tracing::instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), out_dir = %out_dir.display())
)]
pub fn run(input: &Path, out_dir: &Path, config: &PipelineConfig) -> Result<RunSummary> {
    config.validate().context("invalid configuration")?;
    let mut stage = OutputStage::new(out_dir).with_context(|| failed(Stage::Write))?;

    // 1) read and normalize each sheet
    let mut source = sheet::open_source(input).with_context(|| failed(Stage::Read))?;
    let mut tables = Vec::with_capacity(config.sheets.len());
    for schema in &config.sheets {
        info!(sheet = %schema.name, "normalizing");
        let raw = source
            .read_sheet(&schema.name)
            .with_context(|| failed(Stage::Read))?;
        let opts = NormalizeOptions::for_sheet(config, schema);
        let table = normalize_sheet(&raw, schema, &opts)
            .with_context(|| format!("{} ({})", failed(Stage::Normalize), schema.name))?;
        stage
            .write_normalized_rows(&table.output_name, &table.fields, &table.rows)
            .with_context(|| failed(Stage::Write))?;
        tables.push(table);
    }
    let skipped_rows = tables.iter().map(|t| t.skipped_rows).sum();

    // 2) per-sheet filtered copies
    let mut sheet_exclusions = Vec::new();
    if config.filter_sheets {
        for (schema, table) in config.sheets.iter().zip(&tables) {
            let filter = EmptinessFilter::new(
                schema.tracked_metric_count(),
                config.emptiness,
                config.exclusion,
            );
            let outcome = filter
                .apply(&table.rows)
                .with_context(|| format!("{} ({})", failed(Stage::Filter), schema.name))?;
            stage
                .write_normalized_rows(
                    &format!("{}_filtered", table.output_name),
                    &table.fields,
                    &outcome.records,
                )
                .with_context(|| failed(Stage::Write))?;
            sheet_exclusions.push(SheetExclusions {
                sheet: schema.name.clone(),
                excluded: outcome.excluded,
            });
        }
    }

    // 3) merge
    let (merged, merge_report) =
        merge_tables(&tables, &config.merged_metric_order).with_context(|| failed(Stage::Merge))?;
    let first = &config.sheets[0];
    let key_fields = (first.wave.field.as_str(), first.segment.field.as_str());
    stage
        .write_merged(
            &config.merged_output_name,
            key_fields,
            &merged.metric_fields,
            &merged.records,
        )
        .with_context(|| failed(Stage::Write))?;

    // 4) filter the merged table
    let filter = EmptinessFilter::new(
        merged.metric_fields.len(),
        config.emptiness,
        config.exclusion,
    );
    let outcome = filter
        .apply(&merged.records)
        .with_context(|| failed(Stage::Filter))?;
    stage
        .write_merged(
            &format!("{}_filtered", config.merged_output_name),
            key_fields,
            &merged.metric_fields,
            &outcome.records,
        )
        .with_context(|| failed(Stage::Write))?;

    // 5) validate what survived
    let validation = validate_metrics(&merged.metric_fields, &outcome.records, config.emptiness)
        .with_context(|| failed(Stage::Validate))?;

    // 6) report, then publish everything at once
    let report = RunReport {
        validation,
        excluded_segments: outcome.excluded,
        sheet_exclusions,
        join_gaps: merge_report.gaps.len(),
        skipped_rows,
    };
    stage
        .write_json(REPORT_FILE, &report)
        .with_context(|| failed(Stage::Write))?;
    let outputs = stage.publish().with_context(|| failed(Stage::Write))?;

    info!(
        outputs = outputs.len(),
        merged = merged.records.len(),
        kept = outcome.records.len(),
        "pipeline complete"
    );
    Ok(RunSummary {
        outputs,
        report,
        gaps: merge_report.gaps,
    })
}
