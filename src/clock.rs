//! Wall-clock naming helpers: week folder labels, fallback counter buckets and
//! the night window.
//!
//! Every function has a pure form taking the instant explicitly and a
//! `current_*` wrapper reading the system clock.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Timelike, Utc};

/// Fixed offset of the reporting timezone (UTC+3, no daylight saving)
pub const NIGHT_TZ_OFFSET_HOURS: u32 = 3;
/// First hour of the night window, inclusive
pub const NIGHT_START_HOUR: u32 = 0;
/// Last hour of the night window, exclusive
pub const NIGHT_END_HOUR: u32 = 9;

/// Format a date as `DD.MM.YY`
pub fn format_short_date(date: NaiveDate) -> String {
    date.format("%d.%m.%y").to_string()
}

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Week folder label, e.g. `30.12.24 – 05.01.25` (en-dash surrounded by spaces)
pub fn week_label(date: NaiveDate) -> String {
    let start = week_start(date);
    let end = start + Duration::days(6);
    format!("{} – {}", format_short_date(start), format_short_date(end))
}

pub fn current_week_label() -> String {
    week_label(Local::now().date_naive())
}

/// Key of the in-memory fallback counters: ISO-8601 year and week
///
/// Uses the same Monday-start weeks as [`week_label`], so a counter bucket
/// never straddles two week folders.
pub fn week_bucket_key(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-{}", iso.year(), iso.week())
}

pub fn current_week_bucket_key() -> String {
    week_bucket_key(Local::now().date_naive())
}

/// True if `now`, shifted to UTC+3, falls in `[00:00, 09:00)`
pub fn is_night_window(now: DateTime<Utc>) -> bool {
    let shifted_hour = (now.hour() + NIGHT_TZ_OFFSET_HOURS) % 24;
    (NIGHT_START_HOUR..NIGHT_END_HOUR).contains(&shifted_hour)
}

pub fn is_night_now() -> bool {
    is_night_window(Utc::now())
}
