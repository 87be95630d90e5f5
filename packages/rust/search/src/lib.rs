//! Web search for speaking engagements.
//!
//! A person's name is expanded into a fixed, ordered list of search queries
//! ([`build_queries`]); a [`SearchProvider`] runs them and returns the organic
//! hits flattened in query order. Two providers are available:
//!
//! - [`SerperSearch`]: Google results through the Serper API, all queries in
//!   one batched request.
//! - [`DuckDuckGoSearch`]: the DuckDuckGo HTML endpoint, one request per query.

mod duckduckgo;
mod serper;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventfinder_shared::{
    EventFinderError, Result, SearchConfig, SearchProviderKind, SearchResult, read_api_key,
};

pub use duckduckgo::{DuckDuckGoSearch, QUERY_PAUSE as DUCKDUCKGO_QUERY_PAUSE, parse_results_html};
pub use serper::SerperSearch;

/// Query templates in priority order. `{name}` is replaced verbatim.
pub const QUERY_TEMPLATES: &[&str] = &[
    "\"{name}\" upcoming events 2025",
    "\"{name}\" keynote conference",
    "\"{name}\" webinar workshop",
    "\"{name}\" speaking events",
    "site:eventbrite.com \"{name}\"",
    "site:meetup.com \"{name}\"",
];

/// Expand a person name into the ordered search queries.
pub fn build_queries(name: &str) -> Vec<String> {
    QUERY_TEMPLATES
        .iter()
        .map(|template| template.replace("{name}", name))
        .collect()
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run every query and return the hits flattened, first-seen order preserved.
    async fn search(&self, queries: &[String]) -> Result<Vec<SearchResult>>;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
}

/// Build the provider selected in `[search]`.
///
/// A missing API key does not fail here; the provider reports it on each call.
pub fn provider_from_config(config: &SearchConfig) -> Result<Arc<dyn SearchProvider>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let provider: Arc<dyn SearchProvider> = match config.provider {
        SearchProviderKind::Serper => Arc::new(SerperSearch::new(
            read_api_key(&config.api_key_env),
            &config.base_url,
            config.results_per_query,
            timeout,
        )?),
        SearchProviderKind::Duckduckgo => Arc::new(DuckDuckGoSearch::new(
            duckduckgo::DEFAULT_BASE_URL,
            config.results_per_query,
            timeout,
        )?),
    };
    Ok(provider)
}

/// Map a transport failure onto the shared error model.
pub(crate) fn transport_error(
    service: &str,
    timeout: Duration,
    err: reqwest::Error,
) -> EventFinderError {
    if err.is_timeout() {
        EventFinderError::timeout(format!("{service} request"), timeout.as_secs())
    } else {
        EventFinderError::Network(format!("{service}: {err}"))
    }
}

pub(crate) fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|e| EventFinderError::Network(format!("failed to build HTTP client: {e}")))
}
