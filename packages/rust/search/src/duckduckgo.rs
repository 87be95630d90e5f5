//! DuckDuckGo HTML search provider.
//!
//! No API key is needed. The HTML endpoint rate-limits aggressively, so
//! queries run one at a time with a short pause in between, and a throttled
//! or empty page counts as "no results" rather than an error.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use eventfinder_shared::{EventFinderError, Result, SearchResult};
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{SearchProvider, build_client, transport_error};

pub(crate) const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Bodies shorter than this are throttle pages, not result pages.
const MIN_BODY_LEN: usize = 100;

/// Delay between consecutive queries.
pub const QUERY_PAUSE: Duration = Duration::from_millis(500);

static RESULT_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&["div.result", "div.web-result", "div.results_links", "div.result__body"])
});

static TITLE_SELECTORS: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&["a.result__a", "h2 a", ".result__title a", "a"]));

static SNIPPET_SELECTORS: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&[".result__snippet", ".result-snippet", ".snippet"]));

fn selectors(raw: &[&str]) -> Vec<Selector> {
    raw.iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
}

/// Sequential search against `{base_url}/html/?q=...`.
pub struct DuckDuckGoSearch {
    client: Client,
    base_url: String,
    max_results: usize,
    timeout: Duration,
    pause: Duration,
}

impl DuckDuckGoSearch {
    pub fn new(base_url: &str, max_results: usize, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(USER_AGENT, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results,
            timeout,
            pause: QUERY_PAUSE,
        })
    }

    /// Override the delay between consecutive queries.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    async fn fetch_query(&self, query: &str) -> Result<Vec<SearchResult>> {
        let url = Url::parse_with_params(&format!("{}/html/", self.base_url), &[("q", query)])
            .map_err(|e| EventFinderError::validation(format!("bad search URL: {e}")))?;

        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.5")
            .send()
            .await
            .map_err(|e| transport_error("duckduckgo", self.timeout, e))?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            warn!(query, "duckduckgo returned 202, likely throttled");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EventFinderError::api("duckduckgo", status.as_u16(), body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error("duckduckgo", self.timeout, e))?;
        if body.len() < MIN_BODY_LEN {
            warn!(query, len = body.len(), "duckduckgo returned a near-empty page");
            return Ok(Vec::new());
        }

        let mut results = parse_results_html(&body);
        results.truncate(self.max_results);
        Ok(results)
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    #[instrument(skip_all, fields(queries = queries.len()))]
    async fn search(&self, queries: &[String]) -> Result<Vec<SearchResult>> {
        let mut all = Vec::new();
        let mut succeeded = 0usize;
        let mut last_error = None;

        for (i, query) in queries.iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
            match self.fetch_query(query).await {
                Ok(results) => {
                    debug!(query = %query, hits = results.len(), "duckduckgo query done");
                    succeeded += 1;
                    all.extend(results);
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "duckduckgo query failed, skipping");
                    last_error = Some(e);
                }
            }
        }

        info!(
            succeeded,
            total = queries.len(),
            results = all.len(),
            "duckduckgo search complete"
        );
        match last_error {
            // Every query errored: report why instead of an empty success.
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(all),
        }
    }

    fn name(&self) -> &'static str {
        "duckduckgo"
    }
}

// ---------------------------------------------------------------------------
// HTML parsing
// ---------------------------------------------------------------------------

/// Extract organic results from a DuckDuckGo HTML results page.
///
/// The first container selector that matches anything wins; results whose link
/// is relative (other than a `uddg` redirect) are skipped.
pub fn parse_results_html(html: &str) -> Vec<SearchResult> {
    let doc = Html::parse_document(html);

    let containers: Vec<ElementRef<'_>> = RESULT_SELECTORS
        .iter()
        .map(|sel| doc.select(sel).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default();

    containers.into_iter().filter_map(extract_result).collect()
}

fn extract_result(element: ElementRef<'_>) -> Option<SearchResult> {
    let title_el = TITLE_SELECTORS
        .iter()
        .find_map(|sel| element.select(sel).next())?;

    let title = collapse_text(title_el);
    let href = title_el.value().attr("href")?.trim();
    if title.is_empty() || href.is_empty() {
        return None;
    }
    let url = resolve_href(href)?;

    let snippet = SNIPPET_SELECTORS
        .iter()
        .find_map(|sel| element.select(sel).next())
        .map(collapse_text)
        .unwrap_or_default();

    Some(SearchResult {
        title,
        url,
        snippet,
        source: "duckduckgo".into(),
    })
}

/// Turn a result href into an absolute target URL.
fn resolve_href(href: &str) -> Option<String> {
    if href.contains("/l/?") && href.contains("uddg=") {
        let absolute = if href.starts_with("//") {
            format!("https:{href}")
        } else if href.starts_with('/') {
            format!("{DEFAULT_BASE_URL}{href}")
        } else {
            href.to_string()
        };
        let parsed = Url::parse(&absolute).ok()?;
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned());
    }
    if href.starts_with("//") {
        return Some(format!("https:{href}"));
    }
    if href.starts_with('/') {
        return None;
    }
    Some(href.to_string())
}

fn collapse_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
