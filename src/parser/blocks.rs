use scraper::{ElementRef, Html, Selector};

use crate::error::PipelineError;
use crate::settings::ExtractionRules;

/// One candidate event container in the rendered page.
pub type RawBlock<'a> = ElementRef<'a>;

/// `ExtractionRules` with every selector parsed up front.
#[derive(Debug)]
pub struct CompiledRules {
    pub container: Selector,
    pub title: Selector,
    pub link: Selector,
    pub date_block: Selector,
    pub date_fragment: Selector,
    pub time_row: Selector,
    pub time_cell: Selector,
    container_src: String,
}

impl CompiledRules {
    pub fn compile(rules: &ExtractionRules) -> Result<Self, PipelineError> {
        Ok(Self {
            container: parse_selector("container", &rules.container)?,
            title: parse_selector("title", &rules.title)?,
            link: parse_selector("link", &rules.link)?,
            date_block: parse_selector("date_block", &rules.date_block)?,
            date_fragment: parse_selector("date_fragment", &rules.date_fragment)?,
            time_row: parse_selector("time_row", &rules.time_row)?,
            time_cell: parse_selector("time_cell", &rules.time_cell)?,
            container_src: rules.container.clone(),
        })
    }

    pub fn container_source(&self) -> &str {
        &self.container_src
    }
}

fn parse_selector(field: &'static str, src: &str) -> Result<Selector, PipelineError> {
    Selector::parse(src).map_err(|e| PipelineError::InvalidRule {
        field,
        selector: src.to_string(),
        reason: e.to_string(),
    })
}

/// Select event containers in document order. An empty result is not an error here.
pub fn extract<'a>(document: &'a Html, rules: &CompiledRules) -> Vec<RawBlock<'a>> {
    document.select(&rules.container).collect()
}
