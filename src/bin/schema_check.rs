use anyhow::{bail, Result};
use bicsmerge::config::{ColumnSpec, PipelineConfig};
use bicsmerge::process::normalize::{header_texts, locate_column, ColumnLocation};
use bicsmerge::sheet::open_source;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Compare a workbook's header rows against the configured sheet layout
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Workbook or directory of per-sheet CSV exports
    #[arg(short, long)]
    input: Option<PathBuf>,
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Print the effective config as YAML and exit
    #[arg(long)]
    dump_config: bool,
}

/// A minimal description of one configured column as found in the sheet
#[derive(Serialize)]
struct ColumnReport {
    header: String,
    field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_index: Option<usize>,
    status: String,
}

#[derive(Serialize)]
struct SheetReport {
    sheet: String,
    /// 1-based, as shown in a spreadsheet
    header_row: usize,
    ok: bool,
    columns: Vec<ColumnReport>,
}

fn column_report(headers: &[String], spec: &ColumnSpec) -> (ColumnReport, bool) {
    let (status, ok) = match locate_column(headers, spec) {
        ColumnLocation::Found(i) => (format!("found at {}", i), true),
        ColumnLocation::Moved { expected, found } => (
            format!("expected at {} but found at {}", expected, found),
            false,
        ),
        ColumnLocation::Missing => ("missing".to_string(), false),
    };
    (
        ColumnReport {
            header: spec.header.trim().to_string(),
            field: spec.field.clone(),
            expected_index: spec.index,
            status,
        },
        ok,
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    // 1) effective config
    let config = match &args.config {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::default(),
    };
    if args.dump_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }
    let Some(input) = args.input else {
        bail!("--input is required unless --dump-config is given");
    };

    // 2) check every configured sheet's header row
    let mut source = open_source(&input)?;
    let available = source.sheet_names();
    let mut reports = Vec::with_capacity(config.sheets.len());
    for schema in &config.sheets {
        let header_row = config.skip_rows_for(schema);
        if !available.contains(&schema.name) {
            warn!(sheet = %schema.name, "sheet not present");
            reports.push(SheetReport {
                sheet: schema.name.clone(),
                header_row: header_row + 1,
                ok: false,
                columns: Vec::new(),
            });
            continue;
        }
        let raw = source.read_sheet(&schema.name)?;
        let headers = header_texts(&raw, header_row);

        let mut ok = true;
        let mut columns = Vec::new();
        for spec in [&schema.wave, &schema.date_range, &schema.segment]
            .into_iter()
            .chain(schema.metrics.iter())
        {
            let (report, found) = column_report(&headers, spec);
            ok &= found;
            columns.push(report);
        }
        info!(sheet = %schema.name, ok, "checked header row");
        reports.push(SheetReport {
            sheet: schema.name.clone(),
            header_row: header_row + 1,
            ok,
            columns,
        });
    }

    // 3) YAML report to stdout
    print!("{}", serde_yaml::to_string(&reports)?);
    let failing = reports.iter().filter(|r| !r.ok).count();
    if failing > 0 {
        bail!("{} of {} sheets do not match the configured layout", failing, reports.len());
    }
    Ok(())
}
