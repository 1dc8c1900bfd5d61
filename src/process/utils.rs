use super::types::Percent;

/// Substring that marks a segment label as an employee-count band.
pub const BAND_MARKER: &str = "employees";
pub const BAND_PREFIX: &str = "Band: ";
pub const INDUSTRY_PREFIX: &str = "Industry: ";

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Fraction → percentage text with one decimal digit, e.g. `0.098888` → `"9.9"`.
pub fn format_pct(fraction: f64) -> String {
    Percent::from_fraction(fraction).to_string()
}

/// Prefix a segment label with its kind. Anything that is not an
/// employee-count band is an industry.
pub fn format_segment_label(raw: &str) -> String {
    let label = raw.trim();
    let prefix = if label.contains(BAND_MARKER) {
        BAND_PREFIX
    } else {
        INDUSTRY_PREFIX
    };
    format!("{}{}", prefix, label)
}
