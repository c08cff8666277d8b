use chrono::{Datelike, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{PulseError, Result};
use crate::models::{DateRange, DateRangePreset, Month};

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Validate that `tz_name` is a recognised IANA timezone identifier.
pub fn validate_timezone(tz_name: &str) -> bool {
    tz_name.parse::<Tz>().is_ok()
}

/// Today's calendar date in `tz_name`.
///
/// An unrecognised zone logs a warning and uses UTC.
pub fn today_in(tz_name: &str) -> NaiveDate {
    let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("unrecognised timezone \"{}\", falling back to UTC", tz_name);
        Tz::UTC
    });
    Utc::now().with_timezone(&tz).date_naive()
}

// ── Year / month helpers ──────────────────────────────────────────────────────

/// Resolve a year token from a spreadsheet header.
///
/// Two-digit years pivot at 50: `"49"` → 2049, `"50"` → 1950. Any other
/// length is taken verbatim, so an already-resolved year maps to itself.
pub fn resolve_year(token: &str) -> Option<i32> {
    let token = token.trim();
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i32 = token.parse().ok()?;
    if token.len() == 2 {
        Some(if value >= 50 { 1900 + value } else { 2000 + value })
    } else {
        Some(value)
    }
}

/// Calendar month of `date`.
pub fn month_of(date: NaiveDate) -> Month {
    // `month()` is always 1..=12.
    Month::from_number(date.month()).unwrap_or(Month::Jan)
}

/// Shift `(year, month)` by `delta` months, either direction.
pub fn shift_month(year: i32, month: Month, delta: i32) -> (i32, Month) {
    let index = year * 12 + month as i32 + delta;
    let month = Month::ALL[index.rem_euclid(12) as usize];
    (index.div_euclid(12), month)
}

/// Whole calendar months from `start`'s month to `end`'s month.
/// Negative when `end` is in an earlier month.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    let year_diff = end.year() - start.year();
    let month_diff = end.month() as i32 - start.month() as i32;
    year_diff * 12 + month_diff
}

/// Every `(year, month)` from `from`'s month through `to`'s month.
/// Empty when `from` is after `to`.
pub fn months_in_range(from: NaiveDate, to: NaiveDate) -> Vec<(i32, Month)> {
    if from > to {
        return Vec::new();
    }
    let start = (from.year(), month_of(from));
    (0..=months_between(from, to))
        .map(|offset| shift_month(start.0, start.1, offset))
        .collect()
}

/// Chart axis label, e.g. `"Jan 24"`.
pub fn month_label(year: i32, month: Month) -> String {
    format!("{} {:02}", month.abbrev(), year.rem_euclid(100))
}

/// First day of the month containing `date`.
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`.
pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| PulseError::InvalidDate(s.to_string()))
}

// ── DateRangePreset ───────────────────────────────────────────────────────────

impl DateRangePreset {
    /// Concrete range for this preset as seen from `today`.
    pub fn resolve(self, today: NaiveDate) -> DateRange {
        let this_month = first_of_month(today);
        match self {
            DateRangePreset::ThisMonth => DateRange {
                from: this_month,
                to: today,
            },
            DateRangePreset::LastMonth => {
                let from = this_month
                    .checked_sub_months(Months::new(1))
                    .unwrap_or(this_month);
                DateRange {
                    from,
                    to: last_of_month(from),
                }
            }
            DateRangePreset::ThisYear => DateRange {
                from: this_month.with_month(1).unwrap_or(this_month),
                to: today,
            },
            DateRangePreset::LastYear => {
                let year = today.year() - 1;
                DateRange {
                    from: NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(this_month),
                    to: NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(today),
                }
            }
            DateRangePreset::Last12Months => DateRange {
                from: this_month
                    .checked_sub_months(Months::new(11))
                    .unwrap_or(this_month),
                to: today,
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
