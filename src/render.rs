use std::path::Path;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::{info, warn};

use crate::error::PipelineError;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const HTTP_TIMEOUT_SECS: u64 = 60;
const USER_AGENT: &str = concat!("gabba_ical/", env!("CARGO_PKG_VERSION"));

static STATUS_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[1-5]\d{2}\b").unwrap());
static TRANSIENT_WORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(timed out|rate limit(ed)?|too many requests|service unavailable|bad gateway)\b").unwrap()
});

/// Produces the rendered events page. Retries, waiting and transport details
/// stay in here; callers only see a document or `SourceUnavailable`.
pub enum Renderer {
    /// spider.cloud renders the page in a browser.
    Spider(Spider),
    /// Plain GET; enough when the listing is server-rendered.
    Http(reqwest::Client),
}

/// Outcome of one attempt.
struct Failure {
    retryable: bool,
    message: String,
}

impl Renderer {
    /// Spider when `SPIDER_API_KEY` is set, plain HTTP otherwise.
    pub fn from_env() -> Result<Self> {
        match std::env::var("SPIDER_API_KEY") {
            Ok(key) if !key.trim().is_empty() => {
                let spider = Spider::new(Some(key))
                    .map_err(|e| anyhow!("Failed to create Spider client: {}", e))?;
                Ok(Self::Spider(spider))
            }
            _ => {
                let client = reqwest::Client::builder()
                    .user_agent(USER_AGENT)
                    .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                    .build()
                    .context("Failed to build HTTP client")?;
                Ok(Self::Http(client))
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Spider(_) => "spider",
            Self::Http(_) => "http",
        }
    }

    pub async fn render(&self, url: &str) -> Result<String, PipelineError> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Rendering {} via {}", url, self.name()));
        pb.enable_steady_tick(Duration::from_millis(120));

        let start = Instant::now();
        let result = self.render_with_retry(url).await;
        pb.finish_and_clear();

        match result {
            Ok(html) => {
                info!(
                    "Rendered {} ({} bytes) in {:.1}s",
                    url,
                    html.len(),
                    start.elapsed().as_secs_f64()
                );
                Ok(html)
            }
            Err(message) => Err(PipelineError::SourceUnavailable(message)),
        }
    }

    async fn render_with_retry(&self, url: &str) -> Result<String, String> {
        let mut attempt = 0;
        loop {
            match self.render_once(url).await {
                Ok(html) => return Ok(html),
                Err(f) if f.retryable && attempt < MAX_RETRIES => {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "Render of {} failed (attempt {}/{}): {}; backing off {:.1}s",
                        url,
                        attempt + 1,
                        MAX_RETRIES,
                        f.message,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(f) => return Err(f.message),
            }
        }
    }

    async fn render_once(&self, url: &str) -> Result<String, Failure> {
        match self {
            Self::Spider(spider) => spider_once(spider, url).await,
            Self::Http(client) => http_once(client, url).await,
        }
    }
}

async fn spider_once(spider: &Spider, url: &str) -> Result<String, Failure> {
    let params = RequestParams {
        return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
        ..Default::default()
    };

    let value = spider
        .scrape_url(url, Some(params), "application/json")
        .await
        .map_err(|e| {
            let message = e.to_string();
            Failure {
                retryable: is_transient_message(&message),
                message,
            }
        })?;

    let parsed: serde_json::Value = match value.as_str() {
        Some(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        None => value,
    };

    let first = parsed.as_array().and_then(|arr| arr.first());
    let status = first
        .and_then(|obj| obj.get("status"))
        .and_then(|s| s.as_u64());
    if let Some(code) = status.filter(|c| *c >= 400) {
        return Err(Failure {
            retryable: is_transient_status(code as u16),
            message: format!("spider returned status {}", code),
        });
    }

    first
        .and_then(|obj| obj.get("content"))
        .and_then(|c| c.as_str())
        .filter(|c| !c.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| Failure {
            retryable: false,
            message: "no content in spider response".into(),
        })
}

async fn http_once(client: &reqwest::Client, url: &str) -> Result<String, Failure> {
    let response = client.get(url).send().await.map_err(|e| Failure {
        retryable: e.is_timeout() || e.is_connect(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Failure {
            retryable: is_transient_status(status.as_u16()),
            message: format!("HTTP {}", status),
        });
    }

    response.text().await.map_err(|e| Failure {
        retryable: false,
        message: e.to_string(),
    })
}

fn is_transient_status(code: u16) -> bool {
    code == 429 || (500..600).contains(&code)
}

/// Standalone three-digit codes only, so "read 5000 bytes" is not a 500.
fn is_transient_message(message: &str) -> bool {
    TRANSIENT_WORDS_RE.is_match(message)
        || STATUS_CODE_RE
            .find_iter(message)
            .filter_map(|m| m.as_str().parse::<u16>().ok())
            .any(is_transient_status)
}

/// Read a previously saved document instead of rendering.
pub fn load_saved(path: &Path) -> Result<String, PipelineError> {
    let html = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::SourceUnavailable(format!("{}: {}", path.display(), e)))?;
    if html.trim().is_empty() {
        return Err(PipelineError::SourceUnavailable(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(html)
}

/// Save the raw document next to the feed for debugging selector changes.
pub fn dump(path: &Path, html: &str) -> Result<()> {
    std::fs::write(path, html)
        .with_context(|| format!("Failed to dump page to {}", path.display()))?;
    info!("Dumped raw page to {}", path.display());
    Ok(())
}
