//! Display formatting for dashboard values
//!
//! These helpers never fail: missing or malformed values fall back to the
//! placeholder the dashboard shows in their place.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

/// Placeholder for values that are not available
pub const NOT_AVAILABLE: &str = "N/A";

/// Title shown for transcripts without an analysed title
pub const UNNAMED: &str = "Unnamed";

/// Format a number the way the summary cards do: integers without a
/// fractional part, everything else as-is, NaN and missing values as `0`.
#[must_use]
pub fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() && v != 0.0 => {
            if v.fract() == 0.0 {
                format!("{v:.0}")
            } else {
                v.to_string()
            }
        }
        _ => "0".to_string(),
    }
}

/// Format an average as a percentage (`"42.5%"`, `"0%"` when missing)
#[must_use]
pub fn format_percent(value: Option<f64>) -> String {
    format!("{}%", format_number(value))
}

/// Format a success rate with one decimal, `0` when missing or zero
#[must_use]
pub fn format_success_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) if r.is_finite() && r != 0.0 => format!("{r:.1}%"),
        _ => "0%".to_string(),
    }
}

/// Map an overall sentiment in `[-1, 1]` onto a `0..100` percentage with one
/// decimal, `N/A` when missing
#[must_use]
pub fn sentiment_percent(overall_sentiment: Option<f64>) -> String {
    match overall_sentiment {
        Some(s) if s.is_finite() => format!("{:.1}%", (s + 1.0) / 2.0 * 100.0),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Format a date as `M/D/YYYY`
#[must_use]
pub fn format_date(date: &DateTime<Utc>) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}

/// Format a date sent by the backend as `M/D/YYYY`.
///
/// Accepts RFC 3339 timestamps, zone-less timestamps and bare `YYYY-MM-DD`
/// dates; anything else renders as `N/A`.
#[must_use]
pub fn format_raw_date(raw: &str) -> String {
    parse_date(raw.trim()).map_or_else(|| NOT_AVAILABLE.to_string(), |d| format_date(&d))
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Parse a chart component sent as a string.
///
/// Leading numeric text is accepted (`"42.5%"` parses as `42.5`, `"1e3"` as
/// `1000`, `"-Infinity"` as negative infinity); anything without a numeric
/// prefix becomes NaN rather than an error.
#[must_use]
pub fn parse_component(raw: &str) -> f64 {
    let trimmed = raw.trim_start();
    let unsigned = trimmed.trim_start_matches(['+', '-']);
    if trimmed.len() - unsigned.len() <= 1 && unsigned.starts_with("Infinity") {
        return if trimmed.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let end = numeric_prefix_len(trimmed);
    trimmed
        .get(..end)
        .and_then(|prefix| prefix.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = digits_from(end);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits_from(end + 1);
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return 0;
    }

    // Exponent only counts when it has digits.
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_digits = digits_from((end + 1 + sign).min(bytes.len()));
        if exp_digits > 0 {
            end += 1 + sign + exp_digits;
        }
    }
    end
}

/// Text or the `N/A` placeholder when missing or empty
#[must_use]
pub fn or_not_available(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(None, "0")]
    #[case(Some(0.0), "0")]
    #[case(Some(12.0), "12")]
    #[case(Some(67.5), "67.5")]
    #[case(Some(f64::NAN), "0")]
    fn test_format_number(#[case] value: Option<f64>, #[case] expected: &str) {
        assert_eq!(format_number(value), expected);
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(Some(72.0)), "72%");
        assert_eq!(format_percent(None), "0%");
    }

    #[test]
    fn test_format_success_rate() {
        assert_eq!(format_success_rate(Some(66.666)), "66.7%");
        assert_eq!(format_success_rate(Some(0.0)), "0%");
        assert_eq!(format_success_rate(None), "0%");
    }

    #[rstest]
    #[case(1.0, "100.0%")]
    #[case(0.0, "50.0%")]
    #[case(-1.0, "0.0%")]
    #[case(0.25, "62.5%")]
    fn test_sentiment_percent(#[case] sentiment: f64, #[case] expected: &str) {
        assert_eq!(sentiment_percent(Some(sentiment)), expected);
    }

    #[test]
    fn test_missing_sentiment_is_not_available() {
        assert_eq!(sentiment_percent(None), NOT_AVAILABLE);
        assert_eq!(sentiment_percent(Some(f64::NAN)), NOT_AVAILABLE);
    }

    #[rstest]
    #[case("2024-03-05T14:25:30Z", "3/5/2024")]
    #[case("2024-03-05T23:30:00-05:00", "3/6/2024")]
    #[case("2024-03-05T14:25:30.125", "3/5/2024")]
    #[case("2024-03-05", "3/5/2024")]
    #[case("", "N/A")]
    #[case("yesterday", "N/A")]
    fn test_format_raw_date(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(format_raw_date(raw), expected);
    }

    #[test]
    fn test_format_date_has_no_padding() {
        let date = Utc.with_ymd_and_hms(2024, 3, 5, 14, 25, 30).unwrap();
        assert_eq!(format_date(&date), "3/5/2024");
    }

    #[rstest]
    #[case("42", 42.0)]
    #[case("42.5", 42.5)]
    #[case(" 7.25%", 7.25)]
    #[case("-3", -3.0)]
    #[case("1e3", 1000.0)]
    #[case("2.5E-1x", 0.25)]
    #[case("4e", 4.0)]
    #[case(".5", 0.5)]
    fn test_parse_component(#[case] raw: &str, #[case] expected: f64) {
        assert!((parse_component(raw) - expected).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("-")]
    #[case(".")]
    fn test_parse_component_malformed_is_nan(#[case] raw: &str) {
        assert!(parse_component(raw).is_nan());
    }

    #[test]
    fn test_parse_component_infinity() {
        assert_eq!(parse_component("Infinity"), f64::INFINITY);
        assert_eq!(parse_component(" -Infinity%"), f64::NEG_INFINITY);
        assert!(parse_component("--Infinity").is_nan());
        assert!(parse_component("inf").is_nan());
    }

    #[test]
    fn test_or_not_available() {
        assert_eq!(or_not_available(Some("12:30")), "12:30");
        assert_eq!(or_not_available(Some("")), NOT_AVAILABLE);
        assert_eq!(or_not_available(None), NOT_AVAILABLE);
    }
}
