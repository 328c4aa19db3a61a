pub mod blocks;
pub mod dates;
pub mod fields;
pub mod normalize;
pub mod times;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use scraper::Html;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PipelineError, SkipReason};
use crate::settings::Settings;
use blocks::CompiledRules;
use fields::{LinkBase, RawFields};
use normalize::{NormalizeOptions, NormalizedEvent};

/// Everything the pipeline needs besides the document itself.
pub struct PipelineContext {
    pub rules: CompiledRules,
    pub links: LinkBase,
    pub now: DateTime<FixedOffset>,
    pub rollover_days: i64,
    pub preferred_label: String,
    pub normalize: NormalizeOptions,
}

impl PipelineContext {
    pub fn from_settings(settings: &Settings, now: DateTime<Utc>) -> anyhow::Result<Self> {
        let offset = FixedOffset::east_opt(settings.utc_offset_hours * 3600).ok_or_else(|| {
            anyhow::anyhow!("UTC offset out of range: {}h", settings.utc_offset_hours)
        })?;

        Ok(Self {
            rules: CompiledRules::compile(&settings.rules)?,
            links: LinkBase {
                origin: url::Url::parse(&settings.site_origin).map_err(PipelineError::from)?,
                fallback: settings.events_url.clone(),
            },
            now: now.with_timezone(&offset),
            rollover_days: settings.rollover_days,
            preferred_label: settings.preferred_time_label.clone(),
            normalize: NormalizeOptions {
                offset,
                duration: Duration::hours(settings.event_duration_hours),
            },
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedEvent {
    /// Zero-based position of the block in the document.
    pub index: usize,
    pub title: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub candidates: usize,
    pub events: Vec<NormalizedEvent>,
    pub skipped: Vec<SkippedEvent>,
}

impl ExtractionReport {
    /// A feed with zero events must never replace the previous one.
    pub fn ensure_events(&self) -> Result<(), PipelineError> {
        if self.events.is_empty() {
            return Err(PipelineError::NoEventsParsed {
                skipped: self.skipped.len(),
            });
        }
        Ok(())
    }
}

/// Pipeline: document → blocks → raw fields → (date, time) → normalized events.
pub fn process_document(html: &str, ctx: &PipelineContext) -> Result<ExtractionReport, PipelineError> {
    let document = Html::parse_document(html);
    let blocks = blocks::extract(&document, &ctx.rules);
    if blocks.is_empty() {
        return Err(PipelineError::NoCandidatesFound {
            selector: ctx.rules.container_source().to_string(),
        });
    }
    info!("Found {} event blocks", blocks.len());

    let mut report = ExtractionReport {
        candidates: blocks.len(),
        events: Vec::with_capacity(blocks.len()),
        skipped: Vec::new(),
    };

    for (index, block) in blocks.into_iter().enumerate() {
        let raw = fields::parse(block, &ctx.rules, &ctx.links);
        let title = raw.title.clone();
        match process_event(raw, ctx) {
            Ok(event) => report.events.push(event),
            Err(reason) => {
                warn!("Skipping event #{} '{}': {}", index + 1, title, reason);
                report.skipped.push(SkippedEvent { index, title, reason });
            }
        }
    }

    info!(
        "Parsed {} events ({} skipped)",
        report.events.len(),
        report.skipped.len()
    );
    Ok(report)
}

fn process_event(raw: RawFields, ctx: &PipelineContext) -> Result<NormalizedEvent, SkipReason> {
    let date = dates::resolve(raw.date_triple()?, ctx.now, ctx.rollover_days)?;
    let selection = times::select(&raw.time_pairs, &ctx.preferred_label);
    Ok(normalize::normalize(raw.title, raw.url, date, &selection, ctx.normalize))
}

// ── Tests ──
