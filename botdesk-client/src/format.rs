/// Display formatting utilities
///
/// Pure functions, locale-neutral output: `,` thousands grouping, `.`
/// decimal point, USD currency. Missing or non-finite input formats as a
/// defined placeholder instead of panicking.

use chrono::{DateTime, Utc};

/// Format a USD amount with grouping and two fraction digits.
///
/// `format_currency(1234.5)` -> `"$1,234.50"`. Non-finite input formats as
/// the zero placeholder `"$0.00"`.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return "$0.00".to_string();
    }
    let cents = (value.abs() * 100.0).round() as u128;
    let grouped = group_digits(cents / 100);
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Optional-currency family used by the trades table P/L columns: absent
/// values render as `"-"`.
pub fn format_currency_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format_currency(v),
        None => "-".to_string(),
    }
}

/// Format a 0.0-1.0 ratio as a percentage: `format_ratio_pct(0.1523)` ->
/// `"15.23%"`.
pub fn format_ratio_pct(value: f64) -> String {
    format_pct_points(value * 100.0)
}

/// Format an already-scaled percent-points value (0-100 scale):
/// `format_pct_points(1.5)` -> `"1.50%"`.
pub fn format_pct_points(value: f64) -> String {
    if !value.is_finite() {
        return "0.00%".to_string();
    }
    format!("{:.2}%", value)
}

/// Percent-points family with the `"-"` placeholder for absent values.
pub fn format_pct_points_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format_pct_points(v),
        None => "-".to_string(),
    }
}

/// Grouped integer formatting for share/contract volumes:
/// `format_volume(1234567)` -> `"1,234,567"`.
pub fn format_volume(value: u64) -> String {
    group_digits(value as u128)
}

/// Chart tick label (HH:MM:SS)
pub fn format_time_label(time: DateTime<Utc>) -> String {
    time.format("%H:%M:%S").to_string()
}

/// Table timestamp
pub fn format_datetime(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn group_digits(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut groups = Vec::new();
    while value > 0 {
        groups.push((value % 1000) as u16);
        value /= 1000;
    }
    let mut out = groups.pop().map(|g| g.to_string()).unwrap_or_default();
    while let Some(group) = groups.pop() {
        out.push_str(&format!(",{:03}", group));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_currency() {
        struct TestCase {
            input: f64,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: grouped thousands with trailing cents
                input: 1234.5,
                expected: "$1,234.50",
            },
            TestCase {
                // TC1: zero
                input: 0.0,
                expected: "$0.00",
            },
            TestCase {
                // TC2: negative with grouping
                input: -9876543.21,
                expected: "-$9,876,543.21",
            },
            TestCase {
                // TC3: sub-dollar rounding
                input: 0.005,
                expected: "$0.01",
            },
            TestCase {
                // TC4: non-finite falls back to the zero placeholder
                input: f64::NAN,
                expected: "$0.00",
            },
            TestCase {
                // TC5: tiny negative rounds to zero without a stray sign
                input: -0.001,
                expected: "$0.00",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(format_currency(test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_format_currency_opt_placeholder() {
        assert_eq!(format_currency_opt(None), "-");
        assert_eq!(format_currency_opt(Some(10.0)), "$10.00");
    }

    #[test]
    fn test_ratio_and_pct_point_families_stay_distinct() {
        // Same number, different unit, different output.
        assert_eq!(format_ratio_pct(0.1523), "15.23%");
        assert_eq!(format_pct_points(0.1523), "0.15%");
        assert_eq!(format_pct_points(1.5), "1.50%");
        assert_eq!(format_ratio_pct(-0.05), "-5.00%");
    }

    #[test]
    fn test_non_finite_percent_placeholder() {
        assert_eq!(format_ratio_pct(f64::INFINITY), "0.00%");
        assert_eq!(format_pct_points(f64::NAN), "0.00%");
        assert_eq!(format_pct_points_opt(None), "-");
    }

    #[test]
    fn test_format_volume_grouping() {
        assert_eq!(format_volume(0), "0");
        assert_eq!(format_volume(999), "999");
        assert_eq!(format_volume(1_234_567), "1,234,567");
        assert_eq!(format_volume(55_000_000), "55,000,000");
    }

    #[test]
    fn test_time_labels() {
        let time = Utc.with_ymd_and_hms(2024, 6, 3, 14, 30, 5).unwrap();
        assert_eq!(format_time_label(time), "14:30:05");
        assert_eq!(format_datetime(time), "2024-06-03 14:30:05");
    }
}
