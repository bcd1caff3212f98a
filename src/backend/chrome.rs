use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::backend::extract::{
    self, AI_OVERVIEW_CONTAINER, AI_OVERVIEW_EXPAND, QUERY_INPUT, RESULT_CONTAINER, SHOW_MORE_JS,
};
use crate::backend::SearchBackend;
use crate::data_models::SearchResponse;

const GOOGLE_HOME: &str = "https://www.google.com";
const INPUT_TIMEOUT: Duration = Duration::from_secs(10);
const RESULTS_TIMEOUT: Duration = Duration::from_secs(15);
const OVERVIEW_TIMEOUT: Duration = Duration::from_secs(5);
/// Expanded content needs a moment to render before the page is captured.
const EXPAND_SETTLE: Duration = Duration::from_secs(1);

/// Blocking-driver backend: one headless-Chrome session per query, driven
/// synchronously on the blocking pool. The browser process is torn down when
/// the session-scoped [`Browser`] drops, on every exit path.
pub struct SyncBrowserBackend {
    headless: bool,
    driver_path: Option<PathBuf>,
}

impl SyncBrowserBackend {
    pub fn new(headless: bool, driver_path: Option<PathBuf>) -> SyncBrowserBackend {
        SyncBrowserBackend {
            headless,
            driver_path,
        }
    }
}

#[async_trait]
impl SearchBackend for SyncBrowserBackend {
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        anyhow::ensure!(!query.trim().is_empty(), "query must be non-empty");

        let headless = self.headless;
        let driver_path = self.driver_path.clone();
        let query = query.to_string();

        tokio::task::spawn_blocking(move || run_session(headless, driver_path, &query))
            .await
            .context("browser session task panicked")?
    }
}

fn run_session(
    headless: bool,
    driver_path: Option<PathBuf>,
    query: &str,
) -> Result<SearchResponse> {
    let options = LaunchOptions::default_builder()
        .headless(headless)
        .path(driver_path)
        .build()
        .map_err(|e| anyhow!("invalid chrome launch options: {e}"))?;
    let browser = Browser::new(options).context("failed to launch chrome")?;
    let tab = browser.new_tab().context("failed to open tab")?;

    tab.navigate_to(GOOGLE_HOME)
        .context("navigation to search home failed")?;
    tab.wait_until_navigated()
        .context("search home never finished loading")?;

    let input = tab
        .wait_for_element_with_custom_timeout(QUERY_INPUT, INPUT_TIMEOUT)
        .context("query input not found")?;
    input.click().context("query input not clickable")?;
    tab.type_str(query).context("typing query failed")?;
    tab.press_key("Enter").context("submitting query failed")?;

    // Results never appearing means a captcha wall or block, not a failure.
    if tab
        .wait_for_element_with_custom_timeout(RESULT_CONTAINER, RESULTS_TIMEOUT)
        .is_err()
    {
        log::warn!("results never loaded for {query:?}, likely blocked; returning empty");
        return Ok(SearchResponse::empty());
    }

    expand_best_effort(&tab);

    let html = tab.get_content().context("failed to read page content")?;
    Ok(SearchResponse {
        organic_results: extract::extract_results(&html),
        ai_overview: extract::extract_ai_overview(&html),
    })
}

/// "Show more" and the AI-overview expander are both optional page
/// furniture; any failure here is logged and swallowed.
fn expand_best_effort(tab: &Tab) {
    match tab.evaluate(SHOW_MORE_JS, false) {
        Ok(result) => {
            if result.value.and_then(|v| v.as_bool()).unwrap_or(false) {
                log::info!("expanded results via show-more");
                std::thread::sleep(EXPAND_SETTLE);
            }
        }
        Err(e) => log::info!("show-more expansion skipped: {e}"),
    }

    if tab
        .wait_for_element_with_custom_timeout(AI_OVERVIEW_CONTAINER, OVERVIEW_TIMEOUT)
        .is_ok()
    {
        match tab.find_element(AI_OVERVIEW_EXPAND) {
            Ok(expand) => match expand.click() {
                Ok(_) => std::thread::sleep(EXPAND_SETTLE),
                Err(e) => log::info!("ai overview expand control not clickable: {e}"),
            },
            Err(_) => log::info!("ai overview present without expand control"),
        }
    }
}
