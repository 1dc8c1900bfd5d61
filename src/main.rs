use anyhow::Result;
use bicsmerge::{
    config::{
        DateErrorPolicy, EmptinessRule, ExclusionPolicy, PipelineConfig,
        DEFAULT_MAX_EMPTY_FRACTION,
    },
    pipeline,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Policy {
    Strict,
    Thresholded,
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Normalize, merge and filter the business impact survey time series"
)]
struct Args {
    /// Workbook (.xlsx/.xls/.ods) or directory of per-sheet CSV exports
    #[arg(short, long, default_value = "basic data.xlsx")]
    input: PathBuf,
    #[arg(short, long, default_value = "./output")]
    out_dir: PathBuf,
    /// YAML pipeline config; the built-in survey layout when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    policy: Option<Policy>,
    /// Largest fraction of empty waves a segment may have (implies thresholded;
    /// 0.7 when thresholded is chosen without one)
    #[arg(long)]
    threshold: Option<f64>,
    /// Count only nulls, not zeros, as empty
    #[arg(long)]
    null_only: bool,
    /// Drop rows whose date range cannot be parsed instead of aborting
    #[arg(long)]
    skip_bad_dates: bool,
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// CLI flags win over the loaded config.
    fn apply_overrides(&self, config: &mut PipelineConfig) {
        match (self.policy, self.threshold) {
            (Some(Policy::Strict), _) => config.exclusion = ExclusionPolicy::Strict,
            (Some(Policy::Thresholded), t) | (None, t @ Some(_)) => {
                let current = match config.exclusion {
                    ExclusionPolicy::Thresholded { max_empty_fraction } => max_empty_fraction,
                    ExclusionPolicy::Strict => DEFAULT_MAX_EMPTY_FRACTION,
                };
                config.exclusion = ExclusionPolicy::Thresholded {
                    max_empty_fraction: t.unwrap_or(current),
                };
            }
            (None, None) => {}
        }
        if self.null_only {
            config.emptiness = EmptinessRule::NullOnly;
        }
        if self.skip_bad_dates {
            config.on_date_error = DateErrorPolicy::SkipRow;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // ─── 1) init logging ─────────────────────────────────────────────
    let default_filter = if args.verbose {
        "debug,bicsmerge=debug"
    } else {
        "info,bicsmerge=info"
    };
    let env =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load config, apply flags ─────────────────────────────────
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::default(),
    };
    args.apply_overrides(&mut config);
    info!(
        emptiness = ?config.emptiness,
        exclusion = ?config.exclusion,
        on_date_error = ?config.on_date_error,
        "configuration"
    );

    // ─── 3) run ──────────────────────────────────────────────────────
    match pipeline::run(&args.input, &args.out_dir, &config) {
        Ok(summary) => {
            for c in &summary.report.validation.counts {
                println!("\t{} {}", c.metric, c.count);
            }
            info!(
                outputs = summary.outputs.len(),
                excluded = summary.report.excluded_segments.len(),
                "all done"
            );
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("bicsmerge").chain(argv.iter().copied()))
    }

    #[test]
    fn test_threshold_implies_thresholded_policy() {
        let mut config = PipelineConfig::default();
        parse(&["--threshold", "0.7"]).apply_overrides(&mut config);
        assert_eq!(
            config.exclusion,
            ExclusionPolicy::Thresholded {
                max_empty_fraction: 0.7
            }
        );
    }

    #[test]
    fn test_thresholded_without_value_uses_default_fraction() {
        let mut config = PipelineConfig::default();
        parse(&["--policy", "thresholded"]).apply_overrides(&mut config);
        assert_eq!(
            config.exclusion,
            ExclusionPolicy::Thresholded {
                max_empty_fraction: DEFAULT_MAX_EMPTY_FRACTION
            }
        );
        // a segment with every wave empty is still excluded
        assert!(config.exclusion.excludes(23, 23));
        assert!(config.exclusion.excludes(17, 23));
        assert!(!config.exclusion.excludes(16, 23));
    }

    #[test]
    fn test_thresholded_keeps_configured_fraction() {
        let mut config = PipelineConfig {
            exclusion: ExclusionPolicy::Thresholded {
                max_empty_fraction: 0.5,
            },
            ..PipelineConfig::default()
        };
        parse(&["--policy", "thresholded"]).apply_overrides(&mut config);
        assert_eq!(
            config.exclusion,
            ExclusionPolicy::Thresholded {
                max_empty_fraction: 0.5
            }
        );
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = PipelineConfig {
            exclusion: ExclusionPolicy::Thresholded {
                max_empty_fraction: 0.5,
            },
            ..PipelineConfig::default()
        };
        parse(&["--policy", "strict", "--null-only", "--skip-bad-dates"])
            .apply_overrides(&mut config);
        assert_eq!(config.exclusion, ExclusionPolicy::Strict);
        assert_eq!(config.emptiness, EmptinessRule::NullOnly);
        assert_eq!(config.on_date_error, DateErrorPolicy::SkipRow);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let mut config = PipelineConfig::default();
        parse(&[]).apply_overrides(&mut config);
        assert_eq!(config, PipelineConfig::default());
    }
}
