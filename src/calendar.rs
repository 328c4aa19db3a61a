use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use icalendar::{Calendar, Component, Event, Property};
use tracing::info;

use crate::error::PipelineError;
use crate::parser::normalize::NormalizedEvent;
use crate::settings::Settings;

const UTC_STAMP: &str = "%Y%m%dT%H%M%SZ";

/// Feed-level fields written once per calendar.
#[derive(Debug, Clone)]
pub struct FeedMeta {
    pub name: String,
    pub description: String,
    pub prodid: String,
    pub timezone: String,
    pub location: String,
}

impl From<&Settings> for FeedMeta {
    fn from(s: &Settings) -> Self {
        Self {
            name: s.feed_name.clone(),
            description: s.feed_description.clone(),
            prodid: s.prodid.clone(),
            timezone: s.timezone_name.clone(),
            location: s.location.clone(),
        }
    }
}

/// Render events into an iCalendar document. `generated_at` becomes every DTSTAMP.
pub fn serialize(meta: &FeedMeta, events: &[NormalizedEvent], generated_at: DateTime<Utc>) -> Vec<u8> {
    let mut calendar = Calendar::new();
    calendar
        .name(&meta.name)
        .description(&meta.description)
        .timezone(meta.timezone.as_str());

    for ev in events {
        calendar.push(to_vevent(ev, &meta.location, generated_at));
    }

    with_prodid(calendar.to_string(), &meta.prodid).into_bytes()
}

fn to_vevent(ev: &NormalizedEvent, location: &str, generated_at: DateTime<Utc>) -> Event {
    let mut event = Event::new();
    event.uid(&ev.uid);
    event.summary(&ev.title);
    event.description(&ev.description);
    event.timestamp(generated_at);
    event.add_property("LOCATION", location);
    event.add_property("URL", &ev.url);

    if ev.is_all_day {
        let mut start = Property::new("DTSTART", &ev.start.format("%Y%m%d").to_string());
        start.add_parameter("VALUE", "DATE");
        event.append_property(start);
    } else {
        let start = ev.start.with_timezone(&Utc).format(UTC_STAMP).to_string();
        event.add_property("DTSTART", &start);
    }

    if let Some(end) = ev.end {
        let end = end.with_timezone(&Utc).format(UTC_STAMP).to_string();
        event.add_property("DTEND", &end);
    }

    event
}

/// Swap the library's default PRODID line for ours.
fn with_prodid(ics: String, prodid: &str) -> String {
    let Some(start) = ics.find("PRODID:") else {
        return ics;
    };
    let end = ics[start..]
        .find("\r\n")
        .map(|i| start + i)
        .unwrap_or(ics.len());

    let mut out = String::with_capacity(ics.len() + prodid.len());
    out.push_str(&ics[..start]);
    out.push_str("PRODID:");
    out.push_str(prodid);
    out.push_str(&ics[end..]);
    out
}

/// Write the feed through a temporary file so a failed write never leaves a
/// truncated calendar in place.
pub fn write_feed(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let tmp = path.with_extension("ics.tmp");
    let wrap = |source| PipelineError::Serialization {
        path: path.to_path_buf(),
        source,
    };

    fs::write(&tmp, bytes).map_err(wrap)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        wrap(e)
    })?;

    info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
