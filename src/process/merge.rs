use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::process::types::{MergeKey, MergedRecord, MergedTable, NormalizedTable, Percent};

/// A key one sheet never reported; its metrics are null in the merged record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinGap {
    pub wave: String,
    pub segment: String,
    pub sheet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub gaps: Vec<JoinGap>,
}

impl MergeReport {
    pub fn gaps_for(&self, sheet: &str) -> usize {
        self.gaps.iter().filter(|g| g.sheet == sheet).count()
    }
}

/// A key's metrics as reported by each sheet, one slot per table.
struct PartialRecord<'a> {
    key: MergeKey,
    slots: Vec<Option<&'a [Option<Percent>]>>,
}

/// Where each merged column comes from: (table, metric) positions.
fn column_sources(
    tables: &[NormalizedTable],
    metric_order: &[String],
) -> Result<(Vec<String>, Vec<(usize, usize)>), PipelineError> {
    let mut by_field: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut sheet_order = Vec::new();
    for (t, table) in tables.iter().enumerate() {
        for (m, field) in table.fields.metrics.iter().enumerate() {
            if by_field.insert(field.as_str(), (t, m)).is_some() {
                return Err(PipelineError::Config(format!(
                    "metric field '{}' appears in more than one sheet",
                    field
                )));
            }
            sheet_order.push(field.clone());
        }
    }

    let fields = if metric_order.is_empty() {
        sheet_order
    } else {
        if metric_order.len() != by_field.len() {
            return Err(PipelineError::Config(format!(
                "merged column order lists {} fields but the sheets provide {}",
                metric_order.len(),
                by_field.len()
            )));
        }
        metric_order.to_vec()
    };

    let sources = fields
        .iter()
        .map(|f| {
            by_field.get(f.as_str()).copied().ok_or_else(|| {
                PipelineError::Config(format!("no sheet provides metric field '{}'", f))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((fields, sources))
}

/// Join the normalized sheets on (wave, segment).
///
/// Records come out in order of first appearance, scanning `tables` in the
/// order given. A key missing from a sheet yields nulls for that sheet's
/// metrics and a [`JoinGap`] in the report.
///
/// The join is on the wave identifier, never the date. Financial performance
/// asks about the previous week, so its date ranges (and derived start dates)
/// sit one week behind the other sheets for the same wave. Start dates are
/// therefore not comparable across sheets and are left out of the merged
/// record.
#[tracing::instrument(level = "info", skip_all, fields(tables = tables.len()))]
pub fn merge_tables(
    tables: &[NormalizedTable],
    metric_order: &[String],
) -> Result<(MergedTable, MergeReport), PipelineError> {
    let (metric_fields, sources) = column_sources(tables, metric_order)?;

    // 1) index key → partial record, accumulating across sheets
    let mut index: HashMap<MergeKey, usize> = HashMap::new();
    let mut partials: Vec<PartialRecord<'_>> = Vec::new();
    for (t, table) in tables.iter().enumerate() {
        for row in &table.rows {
            let key = MergeKey::new(row.wave.clone(), row.segment.clone());
            let pos = *index.entry(key.clone()).or_insert_with(|| {
                partials.push(PartialRecord {
                    key,
                    slots: vec![None; tables.len()],
                });
                partials.len() - 1
            });
            let slot = &mut partials[pos].slots[t];
            if slot.is_some() {
                return Err(PipelineError::DuplicateKey {
                    sheet: table.sheet.clone(),
                    wave: row.wave.clone(),
                    segment: row.segment.clone(),
                });
            }
            *slot = Some(row.metrics.as_slice());
        }
    }

    // 2) emit, reading every slot; unfilled slots become nulls
    let mut report = MergeReport::default();
    let mut records = Vec::with_capacity(partials.len());
    for partial in partials {
        for (t, slot) in partial.slots.iter().enumerate() {
            if slot.is_none() {
                debug!(key = %partial.key, sheet = %tables[t].sheet, "join gap");
                report.gaps.push(JoinGap {
                    wave: partial.key.wave.clone(),
                    segment: partial.key.segment.clone(),
                    sheet: tables[t].sheet.clone(),
                });
            }
        }
        let metrics = sources
            .iter()
            .map(|&(t, m)| {
                partial.slots[t].and_then(|values| values.get(m).copied().flatten())
            })
            .collect();
        records.push(MergedRecord {
            key: partial.key,
            metrics,
        });
    }

    if !report.gaps.is_empty() {
        warn!(
            gaps = report.gaps.len(),
            "some (wave, segment) keys are missing from at least one sheet; their metrics are null"
        );
    }
    info!(records = records.len(), "merged sheets");

    Ok((
        MergedTable {
            metric_fields,
            records,
        },
        report,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::types::{NormalizedFields, NormalizedRow};
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn p(tenths: i64) -> Option<Percent> {
        Some(Percent::from_tenths(tenths))
    }

    fn table(
        sheet: &str,
        fields: &[&str],
        rows: &[(&str, &str, Vec<Option<Percent>>)],
    ) -> NormalizedTable {
        let date = NaiveDate::from_ymd_opt(2020, 9, 7).unwrap();
        NormalizedTable {
            sheet: sheet.to_string(),
            output_name: sheet.to_lowercase(),
            fields: NormalizedFields {
                wave: "wave".into(),
                date_range: "date".into(),
                segment: "industry_band".into(),
                metrics: fields.iter().map(|f| f.to_string()).collect(),
            },
            rows: rows
                .iter()
                .map(|(wave, segment, metrics)| NormalizedRow {
                    wave: wave.to_string(),
                    date_range: "7 to 20 September 2020".into(),
                    wave_start_date: date,
                    segment: segment.to_string(),
                    metrics: metrics.clone(),
                })
                .collect(),
            skipped_rows: 0,
        }
    }

    fn four_tables() -> Vec<NormalizedTable> {
        vec![
            table(
                "TS",
                &["ts_a", "ts_b"],
                &[
                    ("1", "Industry: Retail", vec![p(10), p(20)]),
                    ("1", "Band: 0 to 9 employees", vec![p(11), None]),
                ],
            ),
            table("FP", &["fp_a"], &[("1", "Industry: Retail", vec![p(30)])]),
            table(
                "WS",
                &["ws_a"],
                &[
                    ("1", "Band: 0 to 9 employees", vec![p(40)]),
                    ("1", "Industry: Retail", vec![p(41)]),
                ],
            ),
            table(
                "CF",
                &["cf_a"],
                &[
                    ("1", "Industry: Retail", vec![p(50)]),
                    ("2", "Industry: Retail", vec![p(51)]),
                ],
            ),
        ]
    }

    #[test]
    fn test_merges_across_sheets() {
        let (merged, report) = merge_tables(&four_tables(), &[]).unwrap();
        assert_eq!(merged.metric_fields, vec!["ts_a", "ts_b", "fp_a", "ws_a", "cf_a"]);

        let retail = MergeKey::new("1", "Industry: Retail");
        assert_eq!(
            merged.get(&retail).unwrap().metrics,
            vec![p(10), p(20), p(30), p(41), p(50)]
        );
        assert_eq!(merged.metric(&retail, "ws_a"), p(41));

        // band never reported by FP or CF
        let band = MergeKey::new("1", "Band: 0 to 9 employees");
        assert_eq!(
            merged.get(&band).unwrap().metrics,
            vec![p(11), None, None, p(40), None]
        );
        assert_eq!(report.gaps_for("FP"), 2);
        assert_eq!(report.gaps_for("CF"), 1);
        assert_eq!(report.gaps_for("TS"), 1);
        assert_eq!(report.gaps_for("WS"), 1);
        assert_eq!(report.gaps.len(), 5);
    }

    #[test]
    fn test_every_key_exactly_once_in_first_appearance_order() {
        let tables = four_tables();
        let (merged, _) = merge_tables(&tables, &[]).unwrap();

        let keys: Vec<(String, String)> = merged
            .records
            .iter()
            .map(|r| (r.key.wave.clone(), r.key.segment.clone()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("1".to_string(), "Industry: Retail".to_string()),
                ("1".to_string(), "Band: 0 to 9 employees".to_string()),
                ("2".to_string(), "Industry: Retail".to_string()),
            ]
        );

        let distinct: HashSet<_> = tables
            .iter()
            .flat_map(|t| t.rows.iter().map(|r| (r.wave.clone(), r.segment.clone())))
            .collect();
        let unique: HashSet<_> = keys.iter().cloned().collect();
        assert_eq!(unique, distinct);
        assert_eq!(unique.len(), keys.len());
    }

    #[test]
    fn test_explicit_column_order() {
        let order: Vec<String> = ["cf_a", "ws_a", "fp_a", "ts_b", "ts_a"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (merged, _) = merge_tables(&four_tables(), &order).unwrap();
        assert_eq!(merged.metric_fields, order);
        assert_eq!(
            merged.records[0].metrics,
            vec![p(50), p(41), p(30), p(20), p(10)]
        );
    }

    #[test]
    fn test_unknown_or_partial_order_is_config_error() {
        let partial = vec!["cf_a".to_string()];
        assert!(matches!(
            merge_tables(&four_tables(), &partial),
            Err(PipelineError::Config(_))
        ));
        let unknown: Vec<String> = ["cf_a", "ws_a", "fp_a", "ts_b", "nope"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(matches!(
            merge_tables(&four_tables(), &unknown),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_duplicate_key_within_sheet_fails_loudly() {
        let tables = vec![table(
            "CF",
            &["cf_a"],
            &[
                ("1", "Industry: Retail", vec![p(50)]),
                ("1", "Industry: Retail", vec![p(51)]),
            ],
        )];
        assert!(matches!(
            merge_tables(&tables, &[]),
            Err(PipelineError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_joins_on_wave_when_dates_disagree() {
        let ts = table("TS", &["ts_a"], &[("20", "Industry: Retail", vec![p(10)])]);
        let mut fp = table("FP", &["fp_a"], &[("20", "Industry: Retail", vec![p(30)])]);
        // financial performance reports the week before
        fp.rows[0].date_range = "30 November to 13 December 2020".into();
        fp.rows[0].wave_start_date = NaiveDate::from_ymd_opt(2020, 11, 30).unwrap();

        let (merged, report) = merge_tables(&[ts, fp], &[]).unwrap();
        assert!(report.gaps.is_empty());
        assert_eq!(merged.records.len(), 1);
        assert_eq!(merged.records[0].metrics, vec![p(10), p(30)]);
    }

    #[test]
    fn test_no_gaps_when_sheets_agree() {
        let tables = vec![
            table("A", &["a"], &[("1", "Industry: X", vec![p(1)])]),
            table("B", &["b"], &[("1", "Industry: X", vec![None])]),
        ];
        let (merged, report) = merge_tables(&tables, &[]).unwrap();
        assert!(report.gaps.is_empty());
        assert_eq!(merged.records.len(), 1);
        assert_eq!(merged.records[0].metrics, vec![p(1), None]);
    }
}
