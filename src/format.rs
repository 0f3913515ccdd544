//! Presentation helpers shared by every email template, so amounts and dates
//! read the same in mail as they do in the app.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "NGN" => Some("₦"),
        "GHS" => Some("GH₵"),
        "KES" => Some("KSh"),
        "ZAR" => Some("R"),
        "INR" => Some("₹"),
        _ => None,
    }
}

/// `1234.5, "USD"` → `$1,234.50`. Unknown codes are prefixed: `CHF 1,234.50`.
pub fn format_currency(amount: f64, currency: &str) -> String {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    let code = currency.trim().to_uppercase();
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let number = format!("{}.{}", group_thousands(whole), cents);
    // -0.001 rounds to 0.00 and must not print as negative
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };

    match currency_symbol(&code) {
        Some(symbol) => format!("{}{}{}", sign, symbol, number),
        None => format!("{}{} {}", sign, code, number),
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `Oct 19, 2026, 3:04 PM WAT` in the display time zone.
pub fn format_datetime(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz)
        .format("%b %-d, %Y, %-I:%M %p %Z")
        .to_string()
}

/// Accepts what the app sends for deadlines: RFC 3339, `datetime-local`
/// values (`2026-10-19T18:30`), SQL-style timestamps, bare dates (end of
/// that day), and unix seconds or milliseconds. Zone-less values are read
/// in `tz`.
pub fn parse_deadline(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(n) = raw.parse::<i64>() {
        // Anything past year ~5000 in seconds is really milliseconds
        return if n.abs() >= 100_000_000_000 {
            Utc.timestamp_millis_opt(n).single()
        } else {
            Utc.timestamp_opt(n, 0).single()
        };
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(23, 59, 59))
        })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Human countdown to a deadline: `2 days 3 hours`, `45 minutes`, `closed`.
pub fn time_remaining(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let left = deadline - now;
    if left <= Duration::zero() {
        return "closed".to_string();
    }

    let days = left.num_days();
    let hours = left.num_hours() % 24;
    let minutes = left.num_minutes() % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(plural(days, "day"));
        if hours > 0 {
            parts.push(plural(hours, "hour"));
        }
    } else if hours > 0 {
        parts.push(plural(hours, "hour"));
        if minutes > 0 {
            parts.push(plural(minutes, "minute"));
        }
    } else if minutes > 0 {
        parts.push(plural(minutes, "minute"));
    } else {
        return "less than a minute".to_string();
    }
    parts.join(" ")
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_groups_and_rounds() {
        assert_eq!(format_currency(1234.5, "USD"), "$1,234.50");
        assert_eq!(format_currency(0.0, "usd"), "$0.00");
        assert_eq!(format_currency(999.999, "GBP"), "£1,000.00");
        assert_eq!(format_currency(1_000_000.0, "NGN"), "₦1,000,000.00");
        assert_eq!(format_currency(12.0, "CHF"), "CHF 12.00");
    }

    #[test]
    fn currency_negative_and_non_finite() {
        assert_eq!(format_currency(-5.0, "USD"), "-$5.00");
        assert_eq!(format_currency(-0.001, "USD"), "$0.00");
        assert_eq!(format_currency(f64::NAN, "EUR"), "€0.00");
    }

    #[test]
    fn datetime_uses_display_zone() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 15, 4, 0).unwrap();
        assert_eq!(format_datetime(at, Tz::UTC), "Oct 19, 2026, 3:04 PM UTC");
        assert_eq!(
            format_datetime(at, chrono_tz::Africa::Lagos),
            "Oct 19, 2026, 4:04 PM WAT"
        );
    }

    #[test]
    fn deadline_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 19, 18, 30, 0).unwrap();
        assert_eq!(parse_deadline("2026-10-19T18:30:00Z", Tz::UTC), Some(expected));
        assert_eq!(parse_deadline("2026-10-19T19:30:00+01:00", Tz::UTC), Some(expected));
        assert_eq!(parse_deadline("2026-10-19T18:30", Tz::UTC), Some(expected));
        assert_eq!(parse_deadline("2026-10-19 18:30:00", Tz::UTC), Some(expected));
        assert_eq!(
            parse_deadline("2026-10-19T19:30", chrono_tz::Africa::Lagos),
            Some(expected)
        );
        assert_eq!(
            parse_deadline(&expected.timestamp().to_string(), Tz::UTC),
            Some(expected)
        );
        assert_eq!(
            parse_deadline(&expected.timestamp_millis().to_string(), Tz::UTC),
            Some(expected)
        );
        assert_eq!(
            parse_deadline("2026-10-19", Tz::UTC),
            Some(Utc.with_ymd_and_hms(2026, 10, 19, 23, 59, 59).unwrap())
        );
        assert_eq!(parse_deadline("next tuesday", Tz::UTC), None);
        assert_eq!(parse_deadline("  ", Tz::UTC), None);
    }

    #[test]
    fn remaining_time_wording() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        assert_eq!(time_remaining(now, now), "closed");
        assert_eq!(time_remaining(now - Duration::hours(1), now), "closed");
        assert_eq!(time_remaining(now + Duration::seconds(30), now), "less than a minute");
        assert_eq!(time_remaining(now + Duration::minutes(45), now), "45 minutes");
        assert_eq!(
            time_remaining(now + Duration::minutes(61), now),
            "1 hour 1 minute"
        );
        assert_eq!(
            time_remaining(now + Duration::days(2) + Duration::hours(3), now),
            "2 days 3 hours"
        );
        assert_eq!(time_remaining(now + Duration::days(1), now), "1 day");
    }

    #[test]
    fn escape_covers_markup() {
        assert_eq!(
            html_escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }
}
