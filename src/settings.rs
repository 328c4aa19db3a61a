use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_FILE: &str = "gabba";
const ENV_PREFIX: &str = "GABBA";

/// CSS selectors describing where event facts live in the rendered page.
/// Every selector except `container` is evaluated relative to a matched container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionRules {
    pub container: String,
    pub title: String,
    pub link: String,
    pub date_block: String,
    pub date_fragment: String,
    pub time_row: String,
    pub time_cell: String,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            container: "div.event-item".into(),
            title: "h3.summary".into(),
            link: "a.event-link".into(),
            date_block: ".event-date".into(),
            date_fragment: "span".into(),
            time_row: ".event-times li".into(),
            time_cell: "span".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub events_url: String,
    pub site_origin: String,
    pub output_file: String,
    /// Directory the feed is written into. Falls back to the current directory.
    pub workdir: Option<PathBuf>,
    pub feed_name: String,
    pub feed_description: String,
    pub prodid: String,
    pub timezone_name: String,
    pub location: String,
    pub utc_offset_hours: i32,
    pub event_duration_hours: i64,
    pub rollover_days: i64,
    pub preferred_time_label: String,
    pub rules: ExtractionRules,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            events_url: "https://thegabba.com.au/whats-on".into(),
            site_origin: "https://thegabba.com.au".into(),
            output_file: "gabba-events.ics".into(),
            workdir: None,
            feed_name: "The Gabba Events".into(),
            feed_description: "Events at The Gabba, scraped from the official website.".into(),
            prodid: "-//Gabba Event Scraper//gabba_ical//EN".into(),
            timezone_name: "Australia/Brisbane".into(),
            location: "The Gabba, Vulture St, Woolloongabba QLD 4102, Australia".into(),
            utc_offset_hours: 10,
            event_duration_hours: 3,
            rollover_days: 30,
            preferred_time_label: "gates open".into(),
            rules: ExtractionRules::default(),
        }
    }
}

impl Settings {
    /// Layer defaults, an optional TOML file and `GABBA_*` environment variables.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read settings")?;

        settings
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn output_path(&self) -> PathBuf {
        let dir = self.workdir.clone().unwrap_or_else(|| PathBuf::from("."));
        dir.join(&self.output_file)
    }
}
