use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::data_models::SearchResult;

// Google SERP selectors, kept in one place so both browser backends and the
// fixture tests agree on them. These track the live DOM and are the first
// thing to update when extraction starts coming back empty.

/// Container for one organic result.
pub const RESULT_CONTAINER: &str = "div.g";
/// Result title inside a container.
pub const TITLE: &str = "h3";
/// First anchor inside a container carries the destination.
pub const LINK: &str = "a[href]";
/// Snippet body; `data-sncf` is the current marker.
pub const SNIPPET: &str = "div[data-sncf]";
/// Older snippet class, still present on some result layouts.
pub const SNIPPET_FALLBACK: &str = "div.VwiC3b";
/// AI-overview panel container.
pub const AI_OVERVIEW_CONTAINER: &str = "div.zNsLfb.Jzkafd";
/// Collapsed-overview expand control.
pub const AI_OVERVIEW_EXPAND: &str = "div.kHtcsd";
/// Text body of the overview once expanded.
pub const AI_OVERVIEW_TEXT: &str = "div.YzCcne";

/// Query input on the Google home page.
pub const QUERY_INPUT: &str = "textarea[name='q']";

/// Clicks the "Show more" affordance if one is on the page. Runs inside the
/// page because the control is only findable by its visible text.
pub const SHOW_MORE_JS: &str = r#"
(() => {
    const nodes = document.querySelectorAll("a, span, div[role='button']");
    for (const el of nodes) {
        if ((el.innerText || "").trim() === "Show more") {
            el.scrollIntoView();
            el.click();
            return true;
        }
    }
    return false;
})()
"#;

static RESULT_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(RESULT_CONTAINER).unwrap());
static TITLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(TITLE).unwrap());
static LINK_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(LINK).unwrap());
static SNIPPET_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(SNIPPET).unwrap());
static SNIPPET_FALLBACK_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(SNIPPET_FALLBACK).unwrap());
static OVERVIEW_CONTAINER_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(AI_OVERVIEW_CONTAINER).unwrap());
static OVERVIEW_TEXT_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(AI_OVERVIEW_TEXT).unwrap());

fn element_text(element: scraper::ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pulls organic results out of a rendered SERP.
///
/// Elements are visited in document order. A container without a title is
/// skipped entirely; a missing link or snippet only empties that field.
/// Positions are assigned 1-based over the results actually kept.
pub fn extract_results(html: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let mut results: Vec<SearchResult> = Vec::new();

    for element in document.select(&RESULT_SEL) {
        let title = element
            .select(&TITLE_SEL)
            .next()
            .map(element_text)
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }

        let link = element
            .select(&LINK_SEL)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| href.to_string());

        let snippet = element
            .select(&SNIPPET_SEL)
            .next()
            .or_else(|| element.select(&SNIPPET_FALLBACK_SEL).next())
            .map(element_text)
            .unwrap_or_default();

        results.push(SearchResult {
            position: results.len() as u32 + 1,
            title,
            link,
            snippet,
        });
    }

    results
}

/// Pulls the AI-overview text out of a rendered SERP, or `""` when no panel
/// is present. Prefers the dedicated text node, falls back to the whole
/// container.
pub fn extract_ai_overview(html: &str) -> String {
    let document = Html::parse_document(html);

    let Some(container) = document.select(&OVERVIEW_CONTAINER_SEL).next() else {
        return String::new();
    };

    document
        .select(&OVERVIEW_TEXT_SEL)
        .next()
        .map(element_text)
        .unwrap_or_else(|| element_text(container))
}
