//! HTML helpers shared by the scraping adapters.
//!
//! `scraper::Html` is not `Send`, so every function here parses synchronously
//! and returns owned data; adapters never hold a document across an await.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Selector};

use crate::core::LicenseResult;

/// DOI sites return best matches first; more rows than this adds noise.
pub(crate) const MAX_RESULT_ROWS: usize = 5;

pub(crate) static TABLE_BODY_ROWS: Lazy<Selector> = Lazy::new(|| selector("table tbody tr"));
pub(crate) static CELLS: Lazy<Selector> = Lazy::new(|| selector("td"));
pub(crate) static LINKS: Lazy<Selector> = Lazy::new(|| selector("a"));

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("invalid whitespace regex"));

static LINE_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"<br\s*/?>")
        .case_insensitive(true)
        .build()
        .expect("invalid line break regex")
});

pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("invalid static selector")
}

/// Text content of an element with runs of whitespace collapsed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Value attribute of the first `<input name="…">` in the document.
pub(crate) fn input_value(document: &Html, name: &str) -> Option<String> {
    let css = format!("input[name=\"{name}\"]");
    let selector = Selector::parse(&css).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
}

/// Lines of authority arrive with literal or entity-escaped `<br/>` markers.
pub(crate) fn normalize_loas(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    LINE_BREAK_RE
        .replace_all(&decoded, "\n")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Column positions of a plain search-results table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RowLayout {
    pub min_cells: usize,
    pub name: usize,
    pub license_number: usize,
    pub license_type: Option<usize>,
    pub status: Option<usize>,
}

/// Parse up to [`MAX_RESULT_ROWS`] rows of a results table into found
/// records. `active` is a case-insensitive "active" match on the status cell.
pub(crate) fn parse_result_rows(body: &str, layout: RowLayout, state: &str) -> Vec<LicenseResult> {
    let document = Html::parse_document(body);

    document
        .select(&TABLE_BODY_ROWS)
        .take(MAX_RESULT_ROWS)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&CELLS).map(element_text).collect();
            if cells.len() < layout.min_cells {
                return None;
            }
            let cell = |idx: Option<usize>| {
                idx.and_then(|i| cells.get(i)).cloned().unwrap_or_default()
            };
            let status = cell(layout.status);

            Some(LicenseResult {
                found: true,
                active: contains_ci(&status, "active"),
                full_name: cell(Some(layout.name)),
                license_number: cell(Some(layout.license_number)),
                state: state.to_string(),
                license_type: cell(layout.license_type),
                status,
                ..Default::default()
            })
        })
        .collect()
}
