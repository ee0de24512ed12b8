//! Pure value/date normalization shared by every extraction strategy.

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::DateGrammar;
use crate::constants::RAW_UNIT_CUTOFF;

static PAREN_NEGATIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(([0-9.]+)\)$").unwrap());

// "Feb 04, 2026" — comma optional, date may be embedded in surrounding text.
static MONTH_DAY_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+(\d{1,2}),?\s+(\d{4})")
        .unwrap()
});

// "23 Jan 2026"
static DAY_MONTH_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})\s+(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+(\d{4})")
        .unwrap()
});

fn month_number(name: &str) -> u32 {
    match name {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => 0,
    }
}

/// Round to one decimal place, the series' reporting precision.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Parse a flow cell into a value, or `None` when the cell carries no value.
///
/// `None` covers both the explicit pending marker ("-"/"—", meaning the
/// source has not reported that day yet) and unparseable junk. Callers
/// substitute 0.0 for the flow but must not treat the cell as a reported
/// zero; the all-pending row-skip rule depends on the distinction.
///
/// Handled formats: thousands separators ("9,199"), non-breaking spaces,
/// trailing seed-value asterisks ("9,199*"), parenthesized negatives
/// ("(44.5)" is -44.5).
pub fn parse_flow_value(text: &str) -> Option<f64> {
    let s: String = text
        .trim()
        .replace(',', "")
        .replace('\u{a0}', "")
        .replace('*', "");

    if s.is_empty() || s == "-" || s == "—" {
        return None;
    }

    if let Some(caps) = PAREN_NEGATIVE_RE.captures(&s) {
        return caps[1].parse::<f64>().ok().map(|v| round1(-v));
    }

    s.parse::<f64>().ok().map(round1)
}

/// Parse a cell into a calendar date, or `None` when it is not a date.
///
/// Besides the source's textual grammar this accepts numeric epochs
/// (milliseconds vs seconds disambiguated by magnitude) and ISO-prefixed
/// strings, both of which show up in API-style payloads. `None` always
/// means "skip this record", never "date unknown but keep".
pub fn parse_calendar_date(text: &str, grammar: DateGrammar) -> Option<NaiveDate> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }

    // Numeric epoch, seconds or milliseconds.
    if s.chars().all(|c| c.is_ascii_digit()) {
        let raw: i64 = s.parse().ok()?;
        let secs = if raw >= 100_000_000_000 { raw / 1000 } else { raw };
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive());
    }

    // ISO-prefixed strings ("2026-01-05", "2026-01-05T00:00:00Z").
    if let Some(prefix) = s.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }

    match grammar {
        DateGrammar::MonthDayYear => {
            let caps = MONTH_DAY_YEAR_RE.captures(s)?;
            let month = month_number(&caps[1]);
            let day: u32 = caps[2].parse().ok()?;
            let year: i32 = caps[3].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        }
        DateGrammar::DayMonthYear => {
            let caps = DAY_MONTH_YEAR_RE.captures(s)?;
            let day: u32 = caps[1].parse().ok()?;
            let month = month_number(&caps[2]);
            let year: i32 = caps[3].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        }
    }
}

/// Bring an API-reported value into the series' unit (US$M).
///
/// Some APIs report raw currency units rather than millions; detect by
/// magnitude and rescale. Known approximation (see constants): preserve the
/// cutoff behavior as-is.
pub fn normalize_magnitude(value: f64) -> f64 {
    if value.abs() > RAW_UNIT_CUTOFF {
        round1(value / 1_000_000.0)
    } else {
        round1(value)
    }
}
