use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, FixedOffset, Month, NaiveDate, NaiveTime, Weekday};
use regex::Regex;
use tracing::debug;

use crate::error::SkipReason;

static DAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d{1,2})(?:st|nd|rd|th)?$").unwrap());

/// Turn a yearless (weekday, day, month) triple into a calendar date.
///
/// The listing never prints a year and only shows upcoming events, so a date
/// that lands more than `rollover_days` before `now` in the current year is
/// taken to mean next year.
pub fn resolve(
    [weekday, day, month]: [&str; 3],
    now: DateTime<FixedOffset>,
    rollover_days: i64,
) -> Result<NaiveDate, SkipReason> {
    let day = parse_day(day)?;
    let month = parse_month(month)?;
    let year = now.year();

    let threshold = (now - Duration::days(rollover_days)).naive_local();

    let date = match NaiveDate::from_ymd_opt(year, month, day) {
        Some(d) if d.and_time(NaiveTime::MIN) < threshold => next_year(year, month, day)?,
        Some(d) => d,
        // 29 Feb outside a leap year can only be a later year.
        None => next_year(year, month, day)?,
    };

    if let Ok(wd) = Weekday::from_str(weekday.trim().trim_end_matches(['.', ','])) {
        if wd != date.weekday() {
            debug!("Weekday '{}' does not match resolved date {}", weekday, date);
        }
    }

    Ok(date)
}

fn next_year(year: i32, month: u32, day: u32) -> Result<NaiveDate, SkipReason> {
    NaiveDate::from_ymd_opt(year + 1, month, day)
        .ok_or(SkipReason::NonexistentDate { day, month })
}

fn parse_day(raw: &str) -> Result<u32, SkipReason> {
    DAY_RE
        .captures(raw.trim())
        .and_then(|c| c[1].parse::<u32>().ok())
        .filter(|d| (1..=31).contains(d))
        .ok_or_else(|| SkipReason::InvalidDayOfMonth(raw.to_string()))
}

fn parse_month(raw: &str) -> Result<u32, SkipReason> {
    Month::from_str(raw.trim().trim_end_matches(['.', ',']))
        .map(|m| m.number_from_month())
        .map_err(|_| SkipReason::InvalidMonth(raw.to_string()))
}
