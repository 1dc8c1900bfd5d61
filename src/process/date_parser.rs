use chrono::{Month, NaiveDate};

use crate::error::DateRangeError;

/// Rendering of wave start dates in every output table.
pub const WAVE_DATE_FORMAT: &str = "%d-%m-%Y";

const RANGE_SEPARATOR: &str = " to ";

/// `day [month [year]]` tokens of one side of a range.
struct Phrase<'a> {
    day: &'a str,
    month: Option<&'a str>,
    year: Option<&'a str>,
}

fn split_phrase<'a>(phrase: &'a str, side: &'static str) -> Result<Phrase<'a>, DateRangeError> {
    let tokens: Vec<&str> = phrase.split_whitespace().collect();
    match tokens.as_slice() {
        [day] => Ok(Phrase {
            day,
            month: None,
            year: None,
        }),
        [day, month] => Ok(Phrase {
            day,
            month: Some(month),
            year: None,
        }),
        [day, month, year] => Ok(Phrase {
            day,
            month: Some(month),
            year: Some(year),
        }),
        _ => Err(DateRangeError::TokenCount {
            phrase: side,
            tokens: tokens.len(),
        }),
    }
}

/// Full English month name, any case. Abbreviations such as `Sep` are
/// rejected even though chrono would accept them.
fn parse_month_name(text: &str) -> Result<Month, DateRangeError> {
    text.parse::<Month>()
        .ok()
        .filter(|m| m.name().eq_ignore_ascii_case(text))
        .ok_or_else(|| DateRangeError::UnknownMonth(text.to_string()))
}

/// Start date of a wave from its free-text week range.
///
/// Handles `19 April to 2 May 2021`, `7 to 20 September 2020` and
/// `28 December 2020 to 10 January 2021`: month and year missing from the
/// start phrase are taken from the end phrase.
pub fn parse_wave_start_date(text: &str) -> Result<NaiveDate, DateRangeError> {
    let mut parts = text.trim().split(RANGE_SEPARATOR);
    let start = parts.next().unwrap_or_default();
    let end = parts.next().ok_or(DateRangeError::MissingSeparator)?;
    if parts.next().is_some() {
        return Err(DateRangeError::AmbiguousSeparator);
    }

    let start = split_phrase(start, "start")?;
    let end = split_phrase(end, "end")?;

    let month = start
        .month
        .or(end.month)
        .ok_or(DateRangeError::MissingMonth)?;
    let year = start.year.or(end.year).ok_or(DateRangeError::MissingYear)?;

    let day: u32 = start
        .day
        .parse()
        .map_err(|_| DateRangeError::InvalidDay(start.day.to_string()))?;
    let month = parse_month_name(month)?;
    let year: i32 = year
        .parse()
        .map_err(|_| DateRangeError::InvalidYear(year.to_string()))?;

    let month = month.number_from_month();
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(DateRangeError::NotACalendarDate { day, month, year })
}

/// `dd-mm-yyyy`
pub fn format_wave_date(date: &NaiveDate) -> String {
    date.format(WAVE_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_of(text: &str) -> String {
        format_wave_date(&parse_wave_start_date(text).unwrap())
    }

    #[test]
    fn test_single_month_span() {
        assert_eq!(start_of("19 April to 2 May 2021"), "19-04-2021");
    }

    #[test]
    fn test_same_month_span() {
        assert_eq!(start_of("7 to 20 September 2020"), "07-09-2020");
    }

    #[test]
    fn test_year_boundary_span() {
        assert_eq!(start_of("28 December 2020 to 10 January 2021"), "28-12-2020");
    }

    #[test]
    fn test_tolerates_surrounding_whitespace() {
        assert_eq!(start_of("  1 June  to 14 June 2020 "), "01-06-2020");
    }

    #[test]
    fn test_missing_separator() {
        assert_eq!(
            parse_wave_start_date("19 April 2021"),
            Err(DateRangeError::MissingSeparator)
        );
    }

    #[test]
    fn test_two_separators() {
        assert_eq!(
            parse_wave_start_date("1 to 2 to 3 May 2021"),
            Err(DateRangeError::AmbiguousSeparator)
        );
    }

    #[test]
    fn test_unknown_month() {
        assert_eq!(
            parse_wave_start_date("19 Foo to 2 May 2021"),
            Err(DateRangeError::UnknownMonth("Foo".into()))
        );
    }

    #[test]
    fn test_month_names_must_be_spelled_out() {
        assert_eq!(
            parse_wave_start_date("7 to 20 Sep 2020"),
            Err(DateRangeError::UnknownMonth("Sep".into()))
        );
        assert_eq!(
            parse_wave_start_date("28 Dec 2020 to 10 January 2021"),
            Err(DateRangeError::UnknownMonth("Dec".into()))
        );
        assert_eq!(start_of("7 to 20 SEPTEMBER 2020"), "07-09-2020");
        // `May` is both the full name and its abbreviation
        assert_eq!(start_of("3 to 16 May 2021"), "03-05-2021");
    }

    #[test]
    fn test_month_not_resolvable() {
        assert_eq!(
            parse_wave_start_date("7 to 20"),
            Err(DateRangeError::MissingMonth)
        );
        assert_eq!(
            parse_wave_start_date("7 to 20 September"),
            Err(DateRangeError::MissingYear)
        );
    }

    #[test]
    fn test_too_many_tokens() {
        assert_eq!(
            parse_wave_start_date("Monday 7 September 2020 to 20 September 2020"),
            Err(DateRangeError::TokenCount {
                phrase: "start",
                tokens: 4
            })
        );
        assert!(matches!(
            parse_wave_start_date(" to 20 September 2020"),
            Err(DateRangeError::MissingSeparator) | Err(DateRangeError::TokenCount { .. })
        ));
    }

    #[test]
    fn test_invalid_day_and_calendar_date() {
        assert_eq!(
            parse_wave_start_date("x to 20 September 2020"),
            Err(DateRangeError::InvalidDay("x".into()))
        );
        assert_eq!(
            parse_wave_start_date("31 to 2 February 2021"),
            Err(DateRangeError::NotACalendarDate {
                day: 31,
                month: 2,
                year: 2021
            })
        );
    }
}
