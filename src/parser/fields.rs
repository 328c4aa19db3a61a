use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::blocks::{CompiledRules, RawBlock};
use crate::error::SkipReason;

pub const UNKNOWN_TITLE: &str = "Unknown Event";

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DISPLAY_NONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)display\s*:\s*none").unwrap());

/// A (value, label) reading such as ("1:30pm", "Gates open").
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimePair {
    pub value: String,
    pub label: String,
}

#[cfg(test)]
impl TimePair {
    pub fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

/// Raw textual facts read out of one block.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFields {
    pub title: String,
    pub url: String,
    /// `None` when the block has no date element at all.
    pub date_fragments: Option<Vec<String>>,
    pub time_pairs: Vec<TimePair>,
}

impl RawFields {
    /// The leading (weekday, day-of-month, month) fragments.
    pub fn date_triple(&self) -> Result<[&str; 3], SkipReason> {
        let fragments = self
            .date_fragments
            .as_deref()
            .ok_or(SkipReason::MissingDateBlock)?;
        match fragments {
            [weekday, day, month, ..] => Ok([weekday.as_str(), day.as_str(), month.as_str()]),
            short => Err(SkipReason::TooFewDateFragments { found: short.len() }),
        }
    }
}

/// Where relative detail links are resolved against.
pub struct LinkBase {
    pub origin: Url,
    pub fallback: String,
}

pub fn parse(block: RawBlock<'_>, rules: &CompiledRules, base: &LinkBase) -> RawFields {
    let title = block
        .select(&rules.title)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let href = block
        .select(&rules.link)
        .find_map(|a| a.value().attr("href"));
    let url = resolve_url(base, href);

    let date_fragments = block
        .select(&rules.date_block)
        .next()
        .map(|date| date_fragments(date, rules));

    let time_pairs = block
        .select(&rules.time_row)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&rules.time_cell).map(element_text).collect();
            match <[String; 2]>::try_from(cells) {
                Ok([value, label]) => Some(TimePair { value, label }),
                Err(cells) => {
                    debug!("Ignoring time row with {} cells", cells.len());
                    None
                }
            }
        })
        .collect();

    RawFields {
        title,
        url,
        date_fragments,
        time_pairs,
    }
}

/// Visible fragments of the date block. When the block has no fragment
/// children its own text is split on whitespace and commas instead.
fn date_fragments(date: ElementRef<'_>, rules: &CompiledRules) -> Vec<String> {
    let fragments: Vec<ElementRef<'_>> = date.select(&rules.date_fragment).collect();
    if fragments.is_empty() {
        if is_hidden(date) {
            return Vec::new();
        }
        return element_text(date)
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    fragments
        .into_iter()
        .filter(|frag| !hidden_within(*frag, date))
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect()
}

fn resolve_url(base: &LinkBase, href: Option<&str>) -> String {
    let href = match href.map(str::trim).filter(|h| !h.is_empty()) {
        Some(h) => h,
        None => return base.fallback.clone(),
    };
    if href.starts_with("https://") || href.starts_with("http://") {
        return href.to_string();
    }
    match base.origin.join(href) {
        Ok(u) => u.to_string(),
        Err(e) => {
            debug!("Unresolvable link '{}': {}", href, e);
            base.fallback.clone()
        }
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    let joined = el.text().collect::<Vec<_>>().join(" ");
    WS_RE.replace_all(joined.trim(), " ").to_string()
}

fn is_hidden(el: ElementRef<'_>) -> bool {
    let v = el.value();
    v.attr("hidden").is_some()
        || v.attr("aria-hidden") == Some("true")
        || v.attr("style").is_some_and(|s| DISPLAY_NONE_RE.is_match(s))
}

/// True if `el` or any ancestor up to (and including) `root` is hidden.
fn hidden_within(el: ElementRef<'_>, root: ElementRef<'_>) -> bool {
    if is_hidden(el) {
        return true;
    }
    for node in (*el).ancestors() {
        if let Some(anc) = ElementRef::wrap(node) {
            if is_hidden(anc) {
                return true;
            }
        }
        if node == *root {
            break;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::blocks;
    use crate::settings::ExtractionRules;
    use scraper::Html;

    fn base() -> LinkBase {
        LinkBase {
            origin: Url::parse("https://thegabba.com.au").unwrap(),
            fallback: "https://thegabba.com.au/whats-on".into(),
        }
    }

    fn parse_one(body: &str) -> RawFields {
        let rules = CompiledRules::compile(&ExtractionRules::default()).unwrap();
        let html = Html::parse_document(&format!(r#"<div class="event-item">{body}</div>"#));
        let block = blocks::extract(&html, &rules).remove(0);
        parse(block, &rules, &base())
    }

    #[test]
    fn full_block() {
        let f = parse_one(
            r#"<h3 class="summary">  Lions v
                  Broncos </h3>
               <a class="event-link" href="/events/lions-broncos">More</a>
               <div class="event-date"><span>Sat</span><span>15</span><span>Jan</span></div>
               <ul class="event-times">
                 <li><span>1:30pm</span><span>Gates open</span></li>
                 <li><span>3:00pm</span><span>First bounce</span></li>
               </ul>"#,
        );
        assert_eq!(f.title, "Lions v Broncos");
        assert_eq!(f.url, "https://thegabba.com.au/events/lions-broncos");
        assert_eq!(f.date_fragments.unwrap(), ["Sat", "15", "Jan"]);
        assert_eq!(
            f.time_pairs,
            [TimePair::new("1:30pm", "Gates open"), TimePair::new("3:00pm", "First bounce")]
        );
    }

    #[test]
    fn missing_title_gets_placeholder() {
        let f = parse_one(r#"<div class="event-date"><span>Sat</span><span>15</span><span>Jan</span></div>"#);
        assert_eq!(f.title, UNKNOWN_TITLE);
    }

    #[test]
    fn absolute_link_passes_through() {
        let f = parse_one(r#"<a class="event-link" href="https://tickets.example.com/x?id=1">Buy</a>"#);
        assert_eq!(f.url, "https://tickets.example.com/x?id=1");
    }

    #[test]
    fn missing_link_falls_back_to_listing() {
        let f = parse_one("<h3 class=\"summary\">Concert</h3>");
        assert_eq!(f.url, "https://thegabba.com.au/whats-on");
    }

    #[test]
    fn hidden_tbc_fragment_dropped() {
        let f = parse_one(
            r#"<div class="event-date">
                 <span style="display: none">TBC</span>
                 <span>Sun</span><span>23</span><span>Nov</span>
               </div>"#,
        );
        assert_eq!(f.date_fragments.unwrap(), ["Sun", "23", "Nov"]);
    }

    #[test]
    fn hidden_wrapper_hides_children() {
        let f = parse_one(
            r#"<div class="event-date">
                 <div style="DISPLAY:NONE"><span>TBC</span></div>
                 <span>Sun</span><span>23</span><span>Nov</span>
               </div>"#,
        );
        assert_eq!(f.date_fragments.unwrap(), ["Sun", "23", "Nov"]);
    }

    #[test]
    fn unstructured_date_text_is_split() {
        let f = parse_one(r#"<div class="event-date">Sun, 23 Nov</div>"#);
        assert_eq!(f.date_fragments.unwrap(), ["Sun", "23", "Nov"]);
    }

    #[test]
    fn odd_arity_rows_ignored() {
        let f = parse_one(
            r#"<ul class="event-times">
                 <li><span>TBC</span></li>
                 <li><span>6pm</span><span>Gates open</span></li>
                 <li><span>a</span><span>b</span><span>c</span></li>
               </ul>"#,
        );
        assert_eq!(f.time_pairs, [TimePair::new("6pm", "Gates open")]);
    }

    #[test]
    fn short_date_is_skip_reason() {
        let f = parse_one(r#"<div class="event-date"><span>15</span><span>Jan</span></div>"#);
        assert_eq!(f.date_triple(), Err(SkipReason::TooFewDateFragments { found: 2 }));
    }

    #[test]
    fn missing_date_block_is_skip_reason() {
        let f = parse_one(r#"<h3 class="summary">Members Day</h3>"#);
        assert_eq!(f.date_fragments, None);
        assert_eq!(f.date_triple(), Err(SkipReason::MissingDateBlock));
    }

    #[test]
    fn hidden_date_block_has_no_fragments() {
        let f = parse_one(r#"<div class="event-date" hidden>Sun 23 Nov</div>"#);
        assert_eq!(f.date_triple(), Err(SkipReason::TooFewDateFragments { found: 0 }));
    }

    #[test]
    fn extra_fragments_use_leading_three() {
        let f = parse_one(
            r#"<div class="event-date"><span>Sat</span><span>15</span><span>Jan</span><span>2025</span></div>"#,
        );
        assert_eq!(f.date_triple().unwrap(), ["Sat", "15", "Jan"]);
    }
}
