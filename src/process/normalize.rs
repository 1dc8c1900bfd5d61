use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::{ColumnSpec, DateErrorPolicy, PipelineConfig, SheetSchema, Transform};
use crate::error::PipelineError;
use crate::process::date_parser::parse_wave_start_date;
use crate::process::types::{NormalizedFields, NormalizedRow, NormalizedTable, Percent};
use crate::process::utils::{clean_str, format_segment_label};
use crate::sheet::{RawCell, RawSheet};

/// Sheet-independent knobs of the normalizer.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub skip_rows: usize,
    pub missing_marker: String,
    pub on_date_error: DateErrorPolicy,
}

impl NormalizeOptions {
    pub fn for_sheet(config: &PipelineConfig, schema: &SheetSchema) -> Self {
        Self {
            skip_rows: config.skip_rows_for(schema),
            missing_marker: config.missing_marker.clone(),
            on_date_error: config.on_date_error,
        }
    }
}

/// Where a configured header was found in the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnLocation {
    Found(usize),
    /// Pinned to `expected` but sitting at `found`.
    Moved { expected: usize, found: usize },
    Missing,
}

/// Header text at each position of row `header_row`.
pub fn header_texts(sheet: &RawSheet, header_row: usize) -> Vec<String> {
    sheet
        .rows
        .get(header_row)
        .map(|row| row.iter().map(|c| clean_str(&c.to_string())).collect())
        .unwrap_or_default()
}

pub fn locate_column(headers: &[String], spec: &ColumnSpec) -> ColumnLocation {
    let wanted = spec.header.trim();
    let found = headers.iter().position(|h| h == wanted);
    match (spec.index, found) {
        (Some(i), _) if headers.get(i).map(String::as_str) == Some(wanted) => {
            ColumnLocation::Found(i)
        }
        (Some(expected), Some(found)) => ColumnLocation::Moved { expected, found },
        (Some(_), None) | (None, None) => ColumnLocation::Missing,
        (None, Some(i)) => ColumnLocation::Found(i),
    }
}

/// Column positions resolved against one sheet's header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub wave: usize,
    pub date_range: usize,
    pub segment: usize,
    pub metrics: Vec<usize>,
}

pub fn resolve_columns(
    sheet: &RawSheet,
    schema: &SheetSchema,
    header_row: usize,
) -> Result<ResolvedColumns, PipelineError> {
    if sheet.rows.len() <= header_row {
        return Err(PipelineError::SchemaMismatch {
            sheet: schema.name.clone(),
            column: "<header row>".into(),
            reason: format!(
                "header expected on row {} but the sheet has {} rows",
                header_row + 1,
                sheet.rows.len()
            ),
        });
    }
    let headers = header_texts(sheet, header_row);

    let resolve = |spec: &ColumnSpec| -> Result<usize, PipelineError> {
        let mismatch = |reason: String| PipelineError::SchemaMismatch {
            sheet: schema.name.clone(),
            column: spec.header.trim().to_string(),
            reason,
        };
        match locate_column(&headers, spec) {
            ColumnLocation::Found(i) => Ok(i),
            ColumnLocation::Moved { expected, found } => Err(mismatch(format!(
                "expected at position {} but found at {}",
                expected, found
            ))),
            ColumnLocation::Missing => Err(mismatch(match spec.index {
                Some(i) => format!(
                    "absent from header row; position {} holds '{}'",
                    i,
                    headers.get(i).map(String::as_str).unwrap_or("")
                ),
                None => "absent from header row".to_string(),
            })),
        }
    };

    Ok(ResolvedColumns {
        wave: resolve(&schema.wave)?,
        date_range: resolve(&schema.date_range)?,
        segment: resolve(&schema.segment)?,
        metrics: schema
            .metrics
            .iter()
            .map(resolve)
            .collect::<Result<Vec<_>, _>>()?,
    })
}

/// Normalize one sheet: select and rename the configured columns, apply
/// their transforms and derive the wave start date.
#[tracing::instrument(level = "info", skip_all, fields(sheet = %schema.name))]
pub fn normalize_sheet(
    sheet: &RawSheet,
    schema: &SheetSchema,
    opts: &NormalizeOptions,
) -> Result<NormalizedTable, PipelineError> {
    let header_row = opts.skip_rows;
    let cols = resolve_columns(sheet, schema, header_row)?;
    debug!(?cols, "resolved columns");

    let marker = opts.missing_marker.trim();
    let mut rows = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut skipped_rows = 0;

    for (idx, raw_row) in sheet.rows.iter().enumerate().skip(header_row + 1) {
        // 1-based, as a spreadsheet user sees it
        let row_no = idx + 1;
        if raw_row.iter().all(RawCell::is_blank) {
            debug!(row = row_no, "skipping blank row");
            continue;
        }

        let cell = move |col: usize| sheet.cell(idx, col);
        let invalid = |spec: &ColumnSpec, value: &RawCell| PipelineError::InvalidCell {
            sheet: schema.name.clone(),
            row: row_no,
            column: spec.header.trim().to_string(),
            value: value.to_string(),
        };

        // 1) identifying columns
        let wave = text_value(cell(cols.wave), schema.wave.transform, marker)
            .ok_or_else(|| invalid(&schema.wave, cell(cols.wave)))?;
        let segment = text_value(cell(cols.segment), schema.segment.transform, marker)
            .ok_or_else(|| invalid(&schema.segment, cell(cols.segment)))?;

        // 2) derived start date
        let date_range = clean_str(&cell(cols.date_range).to_string());
        let wave_start_date = match parse_wave_start_date(&date_range) {
            Ok(d) => d,
            Err(e) => match opts.on_date_error {
                DateErrorPolicy::Abort => {
                    return Err(PipelineError::DateParse {
                        sheet: schema.name.clone(),
                        row: row_no,
                        text: date_range,
                        reason: e.to_string(),
                    })
                }
                DateErrorPolicy::SkipRow => {
                    warn!(row = row_no, text = %date_range, error = %e, "skipping row with unparseable date range");
                    skipped_rows += 1;
                    continue;
                }
            },
        };

        // 3) metrics
        let mut metrics = Vec::with_capacity(schema.metrics.len());
        for (spec, &col) in schema.metrics.iter().zip(&cols.metrics) {
            let value = metric_value(cell(col), spec.transform, marker)
                .ok_or_else(|| invalid(spec, cell(col)))?;
            metrics.push(value);
        }

        if !seen.insert((wave.clone(), segment.clone())) {
            return Err(PipelineError::DuplicateKey {
                sheet: schema.name.clone(),
                wave,
                segment,
            });
        }

        rows.push(NormalizedRow {
            wave,
            date_range,
            wave_start_date,
            segment,
            metrics,
        });
    }

    info!(rows = rows.len(), skipped = skipped_rows, "normalized sheet");
    Ok(NormalizedTable {
        sheet: schema.name.clone(),
        output_name: schema.output_name.clone(),
        fields: NormalizedFields {
            wave: schema.wave.field.clone(),
            date_range: schema.date_range.field.clone(),
            segment: schema.segment.field.clone(),
            metrics: schema.metric_fields(),
        },
        rows,
        skipped_rows,
    })
}

fn is_missing(cell: &RawCell, marker: &str) -> bool {
    match cell {
        RawCell::Text(t) => t.trim() == marker || t.trim().is_empty(),
        other => other.is_blank(),
    }
}

/// Identifying text; `None` when the cell holds no usable value.
fn text_value(cell: &RawCell, transform: Transform, marker: &str) -> Option<String> {
    if is_missing(cell, marker) {
        return None;
    }
    let text = cell.to_string();
    match transform {
        Transform::SegmentLabel => Some(format_segment_label(&text)),
        Transform::None | Transform::Percentage => Some(clean_str(&text)),
    }
}

/// `Some(None)` for a null metric, `None` when the cell is not numeric.
fn metric_value(cell: &RawCell, transform: Transform, marker: &str) -> Option<Option<Percent>> {
    if is_missing(cell, marker) {
        return Some(None);
    }
    let x = match cell {
        RawCell::Number(n) => *n,
        RawCell::Text(t) => clean_str(t).parse::<f64>().ok()?,
        RawCell::Empty => return Some(None),
    };
    if !x.is_finite() {
        return None;
    }
    match transform {
        Transform::Percentage => Some(Some(Percent::from_fraction(x))),
        Transform::None => Some(Some(Percent::from_percent(x))),
        Transform::SegmentLabel => None,
    }
}
