use chrono::NaiveDate;
use std::fmt;

/// Name of the derived start-date column in normalized output.
pub const WAVE_START_DATE_FIELD: &str = "wave_start_date";

/// A percentage held to one decimal digit, stored as tenths of a percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Percent {
    tenths: i64,
}

impl Percent {
    pub const fn from_tenths(tenths: i64) -> Self {
        Self { tenths }
    }

    /// `fraction` is a finite share in [0,1]; `0.098888` becomes `9.9`.
    ///
    /// Ties round away from zero: `0.0625` becomes `6.3`.
    pub fn from_fraction(fraction: f64) -> Self {
        Self::from_tenths((fraction * 1000.0).round() as i64)
    }

    /// `value` is already a percentage, e.g. `9.88` becomes `9.9`.
    pub fn from_percent(value: f64) -> Self {
        Self::from_tenths((value * 10.0).round() as i64)
    }

    pub fn tenths(self) -> i64 {
        self.tenths
    }

    pub fn is_zero(self) -> bool {
        self.tenths == 0
    }

    pub fn as_f64(self) -> f64 {
        self.tenths as f64 / 10.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.tenths < 0 { "-" } else { "" };
        let abs = self.tenths.unsigned_abs();
        write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
    }
}

/// Rows the emptiness filter and validator can inspect.
pub trait MetricRecord {
    fn segment(&self) -> &str;
    fn metrics(&self) -> &[Option<Percent>];
}

/// One (wave, segment) row of a single sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub wave: String,
    pub date_range: String,
    pub wave_start_date: NaiveDate,
    pub segment: String,
    pub metrics: Vec<Option<Percent>>,
}

impl MetricRecord for NormalizedRow {
    fn segment(&self) -> &str {
        &self.segment
    }

    fn metrics(&self) -> &[Option<Percent>] {
        &self.metrics
    }
}

/// Output field names of a normalized table, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFields {
    pub wave: String,
    pub date_range: String,
    pub segment: String,
    pub metrics: Vec<String>,
}

impl NormalizedFields {
    pub fn header(&self) -> Vec<&str> {
        let mut header = vec![
            self.wave.as_str(),
            self.date_range.as_str(),
            WAVE_START_DATE_FIELD,
            self.segment.as_str(),
        ];
        header.extend(self.metrics.iter().map(String::as_str));
        header
    }
}

/// All rows normalized from one sheet.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub sheet: String,
    pub output_name: String,
    pub fields: NormalizedFields,
    pub rows: Vec<NormalizedRow>,
    /// Rows dropped under the skip-row date policy.
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MergeKey {
    pub wave: String,
    pub segment: String,
}

impl MergeKey {
    pub fn new(wave: impl Into<String>, segment: impl Into<String>) -> Self {
        Self {
            wave: wave.into(),
            segment: segment.into(),
        }
    }
}

impl fmt::Display for MergeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wave {} / {}", self.wave, self.segment)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub key: MergeKey,
    pub metrics: Vec<Option<Percent>>,
}

impl MetricRecord for MergedRecord {
    fn segment(&self) -> &str {
        &self.key.segment
    }

    fn metrics(&self) -> &[Option<Percent>] {
        &self.metrics
    }
}

/// One record per (wave, segment) with every tracked metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    pub metric_fields: Vec<String>,
    pub records: Vec<MergedRecord>,
}

impl MergedTable {
    pub fn get(&self, key: &MergeKey) -> Option<&MergedRecord> {
        self.records.iter().find(|r| &r.key == key)
    }

    pub fn metric(&self, key: &MergeKey, field: &str) -> Option<Percent> {
        let idx = self.metric_fields.iter().position(|f| f == field)?;
        self.get(key).and_then(|r| r.metrics[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_display() {
        assert_eq!(Percent::from_tenths(99).to_string(), "9.9");
        assert_eq!(Percent::from_tenths(0).to_string(), "0.0");
        assert_eq!(Percent::from_tenths(1000).to_string(), "100.0");
        assert_eq!(Percent::from_tenths(-15).to_string(), "-1.5");
    }

    #[test]
    fn test_percent_rounding_pins_half_away_from_zero() {
        assert_eq!(Percent::from_fraction(0.098888).to_string(), "9.9");
        // 0.0625 * 1000 is exactly 62.5
        assert_eq!(Percent::from_fraction(0.0625).to_string(), "6.3");
        assert_eq!(Percent::from_fraction(0.1875).to_string(), "18.8");
        assert_eq!(Percent::from_percent(9.88).to_string(), "9.9");
    }

    #[test]
    fn test_tiny_values_render_as_zero() {
        let p = Percent::from_fraction(0.0004);
        assert!(p.is_zero());
        assert_eq!(p.to_string(), "0.0");
    }

    #[test]
    fn test_normalized_header_order() {
        let fields = NormalizedFields {
            wave: "wave".into(),
            date_range: "date".into(),
            segment: "industry_band".into(),
            metrics: vec!["cf_lt_3mths".into()],
        };
        assert_eq!(
            fields.header(),
            vec!["wave", "date", "wave_start_date", "industry_band", "cf_lt_3mths"]
        );
    }
}
