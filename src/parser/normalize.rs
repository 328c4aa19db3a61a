use std::sync::LazyLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use super::times::TimeSelection;

const UID_SEPARATOR: &str = "@";

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?:[:.](\d{2}))?\s*(?:([ap])\.?\s*m\.?)?$").unwrap()
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEvent {
    pub title: String,
    pub start: DateTime<FixedOffset>,
    pub is_all_day: bool,
    pub end: Option<DateTime<FixedOffset>>,
    pub description: String,
    pub url: String,
    pub uid: String,
}

#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    /// Fixed local offset. No daylight saving is applied.
    pub offset: FixedOffset,
    pub duration: Duration,
}

pub fn normalize(
    title: String,
    url: String,
    date: NaiveDate,
    selection: &TimeSelection,
    opts: NormalizeOptions,
) -> NormalizedEvent {
    let time = selection.start.as_deref().and_then(|raw| {
        let parsed = parse_time_of_day(raw);
        if parsed.is_none() {
            warn!("Unreadable start time '{}' for '{}', using all-day", raw, title);
        }
        parsed
    });

    let (start, end) = match time {
        Some(t) => {
            let start = localize(date.and_time(t), opts.offset);
            (start, Some(start + opts.duration))
        }
        None => (localize(date.and_time(NaiveTime::MIN), opts.offset), None),
    };

    let description = build_description(&selection.lines, &url);
    let uid = build_uid(&start, &url);

    NormalizedEvent {
        title,
        start,
        is_all_day: end.is_none(),
        end,
        description,
        url,
        uid,
    }
}

/// Accepts `1:30pm`, `1.30 PM`, `7pm`, `19:30` and `noon`.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("noon") || s.eq_ignore_ascii_case("midday") {
        return NaiveTime::from_hms_opt(12, 0, 0);
    }

    let caps = TIME_RE.captures(s)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };

    let hour = match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(mer) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            match (mer.as_str(), hour) {
                ("a", 12) => 0,
                ("a", h) => h,
                ("p", 12) => 12,
                (_, h) => h + 12,
            }
        }
        // A bare number without minutes is too ambiguous to trust.
        None if caps.get(2).is_none() => return None,
        None => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn localize(naive: NaiveDateTime, offset: FixedOffset) -> DateTime<FixedOffset> {
    naive
        .and_local_timezone(offset)
        .single()
        .unwrap_or_else(|| offset.from_utc_datetime(&naive))
}

fn build_description(lines: &[String], url: &str) -> String {
    let footer = format!("More info: {}", url);
    if lines.is_empty() {
        footer
    } else {
        format!("{}\n\n{}", lines.join("\n"), footer)
    }
}

/// Stable across runs: depends only on the start instant and the source URL.
fn build_uid(start: &DateTime<FixedOffset>, url: &str) -> String {
    format!("{}{}{}", start.to_rfc3339(), UID_SEPARATOR, url)
}
