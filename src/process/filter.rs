use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::config::{EmptinessRule, ExclusionPolicy};
use crate::error::PipelineError;
use crate::process::types::{MetricRecord, Percent};

/// Per-segment wave counts; only lives long enough to decide exclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentEmptinessStat {
    pub segment: String,
    pub waves_total: usize,
    pub waves_empty: usize,
}

impl SegmentEmptinessStat {
    pub fn empty_fraction(&self) -> f64 {
        if self.waves_total == 0 {
            0.0
        } else {
            self.waves_empty as f64 / self.waves_total as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOutcome<R> {
    /// Surviving records, in input order.
    pub records: Vec<R>,
    /// One entry per segment, in order of first appearance.
    pub stats: Vec<SegmentEmptinessStat>,
    pub excluded: Vec<SegmentEmptinessStat>,
}

impl<R> FilterOutcome<R> {
    pub fn excluded_segments(&self) -> Vec<&str> {
        self.excluded.iter().map(|s| s.segment.as_str()).collect()
    }
}

/// Is every metric of a record uninformative under `rule`?
pub fn is_empty_record(metrics: &[Option<Percent>], rule: EmptinessRule) -> bool {
    metrics.iter().all(|v| rule.counts_as_empty(*v))
}

/// Drops segments whose waves are (mostly) empty.
#[derive(Debug, Clone, Copy)]
pub struct EmptinessFilter {
    tracked_metrics: usize,
    rule: EmptinessRule,
    policy: ExclusionPolicy,
}

impl EmptinessFilter {
    pub fn new(tracked_metrics: usize, rule: EmptinessRule, policy: ExclusionPolicy) -> Self {
        Self {
            tracked_metrics,
            rule,
            policy,
        }
    }

    fn check_width(&self, metrics: &[Option<Percent>]) -> Result<(), PipelineError> {
        if metrics.len() != self.tracked_metrics {
            return Err(PipelineError::MetricCountMismatch {
                expected: self.tracked_metrics,
                found: metrics.len(),
            });
        }
        Ok(())
    }

    pub fn segment_stats<R: MetricRecord>(
        &self,
        records: &[R],
    ) -> Result<Vec<SegmentEmptinessStat>, PipelineError> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut stats: Vec<SegmentEmptinessStat> = Vec::new();
        for record in records {
            self.check_width(record.metrics())?;
            let pos = *index.entry(record.segment()).or_insert_with(|| {
                stats.push(SegmentEmptinessStat {
                    segment: record.segment().to_string(),
                    waves_total: 0,
                    waves_empty: 0,
                });
                stats.len() - 1
            });
            let stat = &mut stats[pos];
            stat.waves_total += 1;
            if is_empty_record(record.metrics(), self.rule) {
                stat.waves_empty += 1;
            }
        }
        Ok(stats)
    }

    /// Remove every record of an excluded segment; order is preserved.
    pub fn apply<R: MetricRecord + Clone>(
        &self,
        records: &[R],
    ) -> Result<FilterOutcome<R>, PipelineError> {
        let stats = self.segment_stats(records)?;
        let excluded: Vec<SegmentEmptinessStat> = stats
            .iter()
            .filter(|s| self.policy.excludes(s.waves_empty, s.waves_total))
            .cloned()
            .collect();
        for stat in &stats {
            debug!(
                segment = %stat.segment,
                waves_empty = stat.waves_empty,
                waves_total = stat.waves_total,
                "segment emptiness"
            );
        }
        for stat in &excluded {
            info!(
                segment = %stat.segment,
                "excluding segment ({}/{} waves empty)",
                stat.waves_empty,
                stat.waves_total
            );
        }

        let dropped: HashSet<&str> = excluded.iter().map(|s| s.segment.as_str()).collect();
        let kept: Vec<R> = records
            .iter()
            .filter(|r| !dropped.contains(r.segment()))
            .cloned()
            .collect();
        info!(
            kept = kept.len(),
            removed = records.len() - kept.len(),
            segments_excluded = excluded.len(),
            "emptiness filter applied"
        );

        Ok(FilterOutcome {
            records: kept,
            stats,
            excluded,
        })
    }
}
