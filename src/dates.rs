// 📅 Date normalization for date-only inputs
//
// Stored dates may carry a time component or a timezone suffix
// ("2024-03-01T00:00:00+00:00", "2024-03-01 00:00:00"). Date inputs want a
// plain YYYY-MM-DD. The calendar components are read as written and never
// converted through UTC, so the rendered day is the stored day.

use chrono::NaiveDate;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// True when `s` is exactly `YYYY-MM-DD` (four, two and two ASCII digits).
pub fn is_plain_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit())
}

/// Render a stored date string as `YYYY-MM-DD` for a date-only field.
///
/// Plain dates are returned unchanged. Anything else is cut at `T`, split on
/// `-`, and rebuilt from the leading integer of each component. Returns `None`
/// when the components do not name a real calendar day.
pub fn normalize_date_input(s: &str) -> Option<String> {
    let s = s.trim();
    if is_plain_date(s) {
        return Some(s.to_string());
    }

    components(s).map(|date| date.format(DATE_FORMAT).to_string())
}

/// Parse a stored date string into a calendar date, same rules as
/// [`normalize_date_input`].
pub fn parse_calendar_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if is_plain_date(s) {
        return NaiveDate::parse_from_str(s, DATE_FORMAT).ok();
    }
    components(s)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn components(s: &str) -> Option<NaiveDate> {
    let date_part = s.split('T').next().unwrap_or(s);
    let mut parts = date_part.split('-');

    let year = leading_int(parts.next()?)?;
    let month = leading_int(parts.next()?)?;
    let day = leading_int(parts.next()?)?;

    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

/// Leading run of ASCII digits after optional whitespace ("15 00:00:00" -> 15).
fn leading_int(part: &str) -> Option<i32> {
    let digits: String = part
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_date_returned_unchanged() {
        assert_eq!(normalize_date_input("2024-03-01").as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn test_timestamp_keeps_calendar_day() {
        assert_eq!(
            normalize_date_input("2024-03-01T00:00:00+00:00").as_deref(),
            Some("2024-03-01")
        );
        assert_eq!(
            normalize_date_input("2024-12-31T23:59:59-08:00").as_deref(),
            Some("2024-12-31")
        );
    }

    #[test]
    fn test_space_separated_timestamp() {
        assert_eq!(
            normalize_date_input("2023-07-04 00:00:00").as_deref(),
            Some("2023-07-04")
        );
    }

    #[test]
    fn test_unpadded_components_are_padded() {
        assert_eq!(normalize_date_input("2024-3-9").as_deref(), Some("2024-03-09"));
    }

    #[test]
    fn test_plain_date_passes_through_unchecked() {
        assert_eq!(normalize_date_input("2024-02-30").as_deref(), Some("2024-02-30"));
    }

    #[test]
    fn test_invalid_components() {
        assert_eq!(normalize_date_input("2024-02-30T00:00:00"), None);
        assert_eq!(normalize_date_input("not a date"), None);
        assert_eq!(normalize_date_input(""), None);
    }

    #[test]
    fn test_is_plain_date() {
        assert!(is_plain_date("1999-01-31"));
        assert!(!is_plain_date("1999-1-31"));
        assert!(!is_plain_date("1999/01/31"));
        assert!(!is_plain_date("1999-01-31T00:00"));
    }

    #[test]
    fn test_parse_calendar_date() {
        assert_eq!(
            parse_calendar_date("2020-06-01T12:00:00Z"),
            NaiveDate::from_ymd_opt(2020, 6, 1)
        );
        assert_eq!(parse_calendar_date("2020-13-01"), None);
    }
}
