mod calendar;
mod error;
mod parser;
mod render;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use calendar::FeedMeta;
use parser::{ExtractionReport, PipelineContext};
use settings::Settings;

#[derive(Parser)]
#[command(name = "gabba_ical", about = "Turn The Gabba's events listing into an iCalendar feed")]
struct Cli {
    /// Settings file (default: ./gabba.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Reference date for year inference (YYYY-MM-DD or RFC 3339, default: now)
    #[arg(long, global = true, value_parser = parse_now)]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the live listing and write the feed
    Run {
        /// Output file (default: <workdir>/<output_file>)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also save the raw rendered page here
        #[arg(long)]
        dump_html: Option<PathBuf>,
    },
    /// Build the feed from a saved page
    Parse {
        #[arg(long)]
        html: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print extracted events and skip reasons as JSON
    Inspect {
        #[arg(long)]
        html: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let now = cli.now.unwrap_or_else(Utc::now);
    let ctx = PipelineContext::from_settings(&settings, now)?;

    match cli.command {
        Commands::Run { output, dump_html } => {
            println!("--- Gabba iCal Scraper ---");
            let renderer = render::Renderer::from_env()?;
            let html = renderer.render(&settings.events_url).await?;
            if let Some(path) = dump_html {
                render::dump(&path, &html)?;
            }
            let output = output.unwrap_or_else(|| settings.output_path());
            build_feed(&html, &ctx, &settings, &output)?;
        }
        Commands::Parse { html, output } => {
            let html = render::load_saved(&html)?;
            let output = output.unwrap_or_else(|| settings.output_path());
            build_feed(&html, &ctx, &settings, &output)?;
        }
        Commands::Inspect { html } => {
            let html = render::load_saved(&html)?;
            let report = parser::process_document(&html, &ctx)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }
    Ok(())
}

/// Extract, check and write. Any error here leaves the previous feed untouched.
fn build_feed(html: &str, ctx: &PipelineContext, settings: &Settings, output: &Path) -> Result<()> {
    let report = parser::process_document(html, ctx)?;
    report.ensure_events()?;
    print_summary(&report);

    let bytes = calendar::serialize(&FeedMeta::from(settings), &report.events, Utc::now());
    calendar::write_feed(output, &bytes)
        .with_context(|| format!("Feed not updated ({} events lost)", report.events.len()))?;

    info!("Feed written to {}", output.display());
    println!("Wrote {} events to {}", report.events.len(), output.display());
    Ok(())
}

fn print_summary(report: &ExtractionReport) {
    println!(
        "Parsed {} of {} events ({} skipped)",
        report.events.len(),
        report.candidates,
        report.skipped.len()
    );
    for s in &report.skipped {
        println!("  skipped #{} {}: {}", s.index + 1, s.title, s.reason);
    }
}

fn parse_now(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|e| format!("expected YYYY-MM-DD or RFC 3339: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_accepts_date_or_timestamp() {
        assert_eq!(parse_now("2024-12-20").unwrap().to_rfc3339(), "2024-12-20T00:00:00+00:00");
        assert_eq!(
            parse_now("2024-12-20T09:00:00+10:00").unwrap().to_rfc3339(),
            "2024-12-19T23:00:00+00:00"
        );
        assert!(parse_now("20 Dec").is_err());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["gabba_ical", "--now", "2024-12-20", "parse", "--html", "page.html"]).unwrap();
        assert!(cli.now.is_some());
        assert!(matches!(cli.command, Commands::Parse { ref html, output: None } if html == Path::new("page.html")));
    }

    #[test]
    fn fixture_to_feed_end_to_end() {
        let settings = Settings::default();
        let now = parse_now("2024-12-20").unwrap();
        let ctx = PipelineContext::from_settings(&settings, now).unwrap();
        let dir = std::env::temp_dir().join(format!("gabba_ical_e2e_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let out = dir.join("gabba-events.ics");

        let html = render::load_saved(Path::new("tests/fixtures/whats_on.html")).unwrap();
        build_feed(&html, &ctx, &settings, &out).unwrap();

        let ics = std::fs::read_to_string(&out).unwrap();
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 4);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_listing_writes_nothing() {
        let settings = Settings::default();
        let ctx = PipelineContext::from_settings(&settings, Utc::now()).unwrap();
        let out = std::env::temp_dir().join(format!("gabba_ical_empty_{}.ics", std::process::id()));

        let err = build_feed("<html><body></body></html>", &ctx, &settings, &out).unwrap_err();
        assert!(err.to_string().contains("No event containers"));
        assert!(!out.exists());
    }
}
