use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};

use crate::backend::SearchBackend;
use crate::backend::extract::{
    self, AI_OVERVIEW_CONTAINER, AI_OVERVIEW_EXPAND, QUERY_INPUT, RESULT_CONTAINER, SHOW_MORE_JS,
};
use crate::data_models::SearchResponse;

const GOOGLE_HOME: &str = "https://www.google.com/";
const NAV_TIMEOUT: Duration = Duration::from_secs(30);
const INPUT_TIMEOUT: Duration = Duration::from_secs(10);
const RESULTS_TIMEOUT: Duration = Duration::from_secs(15);
const OVERVIEW_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Expanded content needs a moment to render before the page is captured.
const EXPAND_SETTLE: Duration = Duration::from_secs(1);
/// Inter-keystroke delay while typing the query, to read as human input.
const TYPE_DELAY: Duration = Duration::from_millis(200);

const STEALTH_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/111.0.0.0 Safari/537.36";

/// Injected before any page script runs; automation-controlled Chrome leaks
/// itself through `navigator.webdriver`.
const STEALTH_INIT_JS: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// Async-driver backend: a cooperatively scheduled Chrome session per query,
/// stealth-enabled. The CDP event handler runs as its own task for the life
/// of the session and is drained during teardown.
pub struct AsyncBrowserBackend {
    headless: bool,
}

impl AsyncBrowserBackend {
    pub fn new(headless: bool) -> AsyncBrowserBackend {
        AsyncBrowserBackend { headless }
    }
}

#[async_trait]
impl SearchBackend for AsyncBrowserBackend {
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        anyhow::ensure!(!query.trim().is_empty(), "query must be non-empty");

        let session = BrowserSession::launch(self.headless).await?;
        let outcome = run_search(&session, query).await;
        session.close().await;
        outcome
    }
}

/// Scoped browser acquisition: `close` tears the session down and is called
/// on every exit path of `search`, blocked or not.
struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(headless: bool) -> Result<BrowserSession> {
        let builder = if headless {
            BrowserConfig::builder()
        } else {
            BrowserConfig::builder().with_head()
        };
        let config = builder
            .build()
            .map_err(|e| anyhow!("invalid browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch chrome")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(BrowserSession {
            browser,
            handler_task,
        })
    }

    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            log::warn!("browser close failed: {e}");
            self.handler_task.abort();
            return;
        }
        let _ = self.browser.wait().await;
        let _ = self.handler_task.await;
    }
}

async fn run_search(session: &BrowserSession, query: &str) -> Result<SearchResponse> {
    let page = session
        .browser
        .new_page("about:blank")
        .await
        .context("failed to open page")?;

    page.set_user_agent(STEALTH_UA)
        .await
        .context("failed to override user agent")?;
    let stealth = AddScriptToEvaluateOnNewDocumentParams::builder()
        .source(STEALTH_INIT_JS)
        .build()
        .map_err(|e| anyhow!("invalid stealth script params: {e}"))?;
    page.execute(stealth)
        .await
        .context("failed to install stealth script")?;

    timeout(NAV_TIMEOUT, page.goto(GOOGLE_HOME))
        .await
        .map_err(|_| anyhow!("navigation to search home timed out"))?
        .context("navigation to search home failed")?;

    let input = wait_for_selector(&page, QUERY_INPUT, INPUT_TIMEOUT)
        .await
        .context("query input not found")?;
    input.click().await.context("query input not clickable")?;
    type_paced(&input, query).await?;
    input
        .press_key("Enter")
        .await
        .context("submitting query failed")?;

    // Results never appearing means a captcha wall or block, not a failure.
    if wait_for_selector(&page, RESULT_CONTAINER, RESULTS_TIMEOUT)
        .await
        .is_err()
    {
        log::warn!("results never loaded for {query:?}, likely blocked; returning empty");
        return Ok(SearchResponse::empty());
    }

    expand_best_effort(&page).await;

    let html = page.content().await.context("failed to read page content")?;
    Ok(SearchResponse {
        organic_results: extract::extract_results(&html),
        ai_overview: extract::extract_ai_overview(&html),
    })
}

async fn type_paced(input: &Element, query: &str) -> Result<()> {
    for ch in query.chars() {
        input
            .type_str(ch.to_string())
            .await
            .context("typing query failed")?;
        sleep(TYPE_DELAY).await;
    }
    Ok(())
}

/// Polls for a selector until it resolves or the deadline passes. The CDP
/// protocol has no waiting primitive, so this mirrors the page-side wait the
/// driver would otherwise do.
async fn wait_for_selector(page: &Page, selector: &str, limit: Duration) -> Result<Element> {
    let deadline = Instant::now() + limit;
    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }
        if Instant::now() >= deadline {
            bail!("timed out waiting for `{selector}`");
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// "Show more" and the AI-overview expander are both optional page
/// furniture; any failure here is logged and swallowed.
async fn expand_best_effort(page: &Page) {
    match page.evaluate(SHOW_MORE_JS).await {
        Ok(value) => {
            if value.into_value::<bool>().unwrap_or(false) {
                log::info!("expanded results via show-more");
                sleep(EXPAND_SETTLE).await;
            }
        }
        Err(e) => log::info!("show-more expansion skipped: {e}"),
    }

    if wait_for_selector(page, AI_OVERVIEW_CONTAINER, OVERVIEW_TIMEOUT)
        .await
        .is_ok()
    {
        match page.find_element(AI_OVERVIEW_EXPAND).await {
            Ok(expand) => match expand.click().await {
                Ok(_) => sleep(EXPAND_SETTLE).await,
                Err(e) => log::info!("ai overview expand control not clickable: {e}"),
            },
            Err(_) => log::info!("ai overview present without expand control"),
        }
    }
}
