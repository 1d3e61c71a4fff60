use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

pub const DEFAULT_DECIMALS: usize = 2;

/// `$1,234.50`, `-$12.00`.
pub fn format_currency(amount: f64) -> String {
    let body = format_number(amount.abs(), 2);
    if amount < 0.0 && has_nonzero_digit(&body) {
        format!("-${}", body)
    } else {
        format!("${}", body)
    }
}

/// Fixed `decimals` places with comma thousands grouping. Ties round away
/// from zero, so `2.5` becomes `3` and `180.125` becomes `180.13`.
pub fn format_number(num: f64, decimals: usize) -> String {
    if num.is_nan() {
        return "NaN".to_string();
    }
    if num.is_infinite() {
        return if num > 0.0 { "∞".to_string() } else { "-∞".to_string() };
    }

    let fixed = round_half_away(num.abs(), decimals);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
    if num < 0.0 && has_nonzero_digit(&fixed) {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// A [0,1] fraction rendered as a whole percentage, clamped first.
pub fn format_percent(fraction: f64) -> String {
    format!("{}%", format_number(clamp_unit(fraction) * 100.0, 0))
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// `rsi_14` -> `RSI 14`.
pub fn indicator_label(key: &str) -> String {
    key.replace('_', " ").to_uppercase()
}

/// Renders an ISO8601 timestamp as `M/D/YYYY, h:mm:ss AM`.
///
/// Offset-carrying timestamps are converted into `tz` (or the local zone).
/// Naive timestamps, which is what the trading server emits, are taken as
/// already being in display time. Anything unparseable comes back unchanged.
pub fn format_timestamp(raw: &str, tz: Option<Tz>) -> String {
    const DISPLAY: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return match tz {
            Some(tz) => parsed.with_timezone(&tz).format(DISPLAY).to_string(),
            None => parsed.with_timezone(&Local).format(DISPLAY).to_string(),
        };
    }

    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return naive.format(DISPLAY).to_string();
        }
    }

    raw.to_string()
}

/// Same display format for an instant we produced ourselves.
pub fn format_instant<Z: TimeZone>(instant: &DateTime<Z>, tz: Option<Tz>) -> String
where
    Z::Offset: std::fmt::Display,
{
    format_timestamp(&instant.to_rfc3339(), tz)
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (len - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Rounds a non-negative finite value to `decimals` places, ties away from zero.
///
/// Works on the exact decimal expansion of the double rather than on a scaled
/// float, so `1.005` (really 1.00499...) stays `1.00` while `180.125` rounds up.
fn round_half_away(abs: f64, decimals: usize) -> String {
    let wide = format!("{:.*}", decimals + GUARD_DIGITS, abs);
    let Some((int_part, frac)) = wide.split_once('.') else {
        return wide;
    };

    let mut digits: Vec<u8> = int_part.bytes().chain(frac.bytes().take(decimals)).collect();
    let round_up = frac.as_bytes().get(decimals).is_some_and(|d| *d >= b'5');

    if round_up {
        let mut carry = true;
        for d in digits.iter_mut().rev() {
            if *d == b'9' {
                *d = b'0';
            } else {
                *d += 1;
                carry = false;
                break;
            }
        }
        if carry {
            digits.insert(0, b'1');
        }
    }

    let split = digits.len() - decimals;
    let text: String = digits.iter().map(|d| *d as char).collect();
    if decimals == 0 {
        text
    } else {
        format!("{}.{}", &text[..split], &text[split..])
    }
}

const GUARD_DIGITS: usize = 25;

fn has_nonzero_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit() && c != '0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_matches_en_us() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(1234.5), "$1,234.50");
        assert_eq!(format_currency(100000.0), "$100,000.00");
        assert_eq!(format_currency(-1800.0), "-$1,800.00");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
    }

    #[test]
    fn number_precision_and_grouping() {
        assert_eq!(format_number(3.14159, 2), "3.14");
        assert_eq!(format_number(3.0, 4), "3.0000");
        assert_eq!(format_number(61.234, DEFAULT_DECIMALS), "61.23");
        assert_eq!(format_number(82.0, 0), "82");
        assert_eq!(format_number(12345.0, 0), "12,345");
        assert_eq!(format_number(-0.4, 2), "-0.40");
    }

    #[test]
    fn exact_ties_round_away_from_zero() {
        assert_eq!(format_currency(180.125), "$180.13");
        assert_eq!(format_currency(2.375), "$2.38");
        assert_eq!(format_currency(-180.125), "-$180.13");
        assert_eq!(format_percent(0.625), "63%");
        assert_eq!(format_number(12.5, 0), "13");
        assert_eq!(format_number(2.5, 0), "3");
        assert_eq!(format_number(999.5, 0), "1,000");
        assert_eq!(format_number(9.995, 2), "9.99");
    }

    #[test]
    fn values_just_below_a_tie_round_down() {
        // 1.005 is stored as 1.00499999999999989...
        assert_eq!(format_number(1.005, 2), "1.00");
        assert_eq!(format_number(0.145, 2), "0.14");
    }

    #[test]
    fn tiny_negatives_do_not_render_as_negative_zero() {
        assert_eq!(format_number(-0.0001, 2), "0.00");
        assert_eq!(format_currency(-0.001), "$0.00");
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(format_percent(0.824), "82%");
        assert_eq!(format_percent(1.7), "100%");
        assert_eq!(format_percent(-0.2), "0%");
        assert_eq!(format_percent(f64::NAN), "0%");
    }

    #[test]
    fn indicator_labels_are_spaced_and_uppercased() {
        assert_eq!(indicator_label("sma_20"), "SMA 20");
        assert_eq!(indicator_label("bb_upper_band"), "BB UPPER BAND");
    }

    #[test]
    fn naive_timestamps_are_rendered_without_conversion() {
        assert_eq!(format_timestamp("2024-03-01T15:04:05.123456", None), "3/1/2024, 3:04:05 PM");
        assert_eq!(format_timestamp("2024-12-09 09:00:00", None), "12/9/2024, 9:00:00 AM");
    }

    #[test]
    fn offset_timestamps_follow_display_zone() {
        let tz: Tz = "America/New_York".parse().unwrap();
        assert_eq!(format_timestamp("2024-07-01T16:30:00Z", Some(tz)), "7/1/2024, 12:30:00 PM");
    }

    #[test]
    fn garbage_timestamps_pass_through() {
        assert_eq!(format_timestamp("yesterday", None), "yesterday");
    }
}
