use serde::Serialize;
use tracing::{info, warn};

use crate::config::EmptinessRule;
use crate::error::PipelineError;
use crate::process::types::MetricRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricNullZeroCount {
    pub metric: String,
    pub count: usize,
}

/// Per-metric count of null (and, under the default rule, zero) values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub rule: EmptinessRule,
    pub records: usize,
    pub counts: Vec<MetricNullZeroCount>,
}

impl ValidationReport {
    pub fn count_for(&self, metric: &str) -> Option<usize> {
        self.counts
            .iter()
            .find(|c| c.metric == metric)
            .map(|c| c.count)
    }
}

/// Count uninformative values per metric. Purely diagnostic; nothing is
/// modified.
pub fn validate_metrics<R: MetricRecord>(
    fields: &[String],
    records: &[R],
    rule: EmptinessRule,
) -> Result<ValidationReport, PipelineError> {
    let mut counts = vec![0usize; fields.len()];
    for record in records {
        let metrics = record.metrics();
        if metrics.len() != fields.len() {
            return Err(PipelineError::MetricCountMismatch {
                expected: fields.len(),
                found: metrics.len(),
            });
        }
        for (count, value) in counts.iter_mut().zip(metrics) {
            if rule.counts_as_empty(*value) {
                *count += 1;
            }
        }
    }

    let counts: Vec<MetricNullZeroCount> = fields
        .iter()
        .zip(counts)
        .map(|(metric, count)| MetricNullZeroCount {
            metric: metric.clone(),
            count,
        })
        .collect();
    for c in &counts {
        info!(metric = %c.metric, count = c.count, records = records.len(), "null/zero values");
        if !records.is_empty() && c.count == records.len() {
            warn!(metric = %c.metric, "metric carries no information in any surviving record");
        }
    }

    Ok(ValidationReport {
        rule,
        records: records.len(),
        counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::types::{MergeKey, MergedRecord, Percent};

    fn p(tenths: i64) -> Option<Percent> {
        Some(Percent::from_tenths(tenths))
    }

    fn records() -> Vec<MergedRecord> {
        vec![
            MergedRecord {
                key: MergeKey::new("1", "Industry: Retail"),
                metrics: vec![p(0), None, p(12)],
            },
            MergedRecord {
                key: MergeKey::new("2", "Industry: Retail"),
                metrics: vec![None, p(3), p(14)],
            },
            MergedRecord {
                key: MergeKey::new("3", "Industry: Retail"),
                metrics: vec![p(0), None, None],
            },
        ]
    }

    fn fields() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn test_counts_null_and_zero() {
        let report = validate_metrics(&fields(), &records(), EmptinessRule::NullOrZero).unwrap();
        assert_eq!(report.records, 3);
        assert_eq!(report.count_for("a"), Some(3));
        assert_eq!(report.count_for("b"), Some(2));
        assert_eq!(report.count_for("c"), Some(1));
        assert_eq!(report.count_for("d"), None);
    }

    #[test]
    fn test_null_only_rule_ignores_zero() {
        let report = validate_metrics(&fields(), &records(), EmptinessRule::NullOnly).unwrap();
        assert_eq!(report.count_for("a"), Some(1));
        assert_eq!(report.count_for("b"), Some(2));
    }

    #[test]
    fn test_empty_input_counts_zero() {
        let none: Vec<MergedRecord> = Vec::new();
        let report = validate_metrics(&fields(), &none, EmptinessRule::NullOrZero).unwrap();
        assert!(report.counts.iter().all(|c| c.count == 0));
        assert_eq!(report.counts.len(), 3);
    }

    #[test]
    fn test_width_mismatch() {
        let err = validate_metrics(&fields()[..2], &records(), EmptinessRule::NullOrZero);
        assert!(matches!(
            err,
            Err(PipelineError::MetricCountMismatch {
                expected: 2,
                found: 3
            })
        ));
    }
}
