//! Serper (Google Search API) provider.

use std::time::Duration;

use async_trait::async_trait;
use eventfinder_shared::{EventFinderError, Result, SearchResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{SearchProvider, build_client, transport_error};

const USER_AGENT: &str = concat!("EventFinder/", env!("CARGO_PKG_VERSION"));

/// Batched Google search through `POST {base_url}/search`.
pub struct SerperSearch {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    results_per_query: usize,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct SerperQuery<'a> {
    q: &'a str,
    num: usize,
}

/// The batch endpoint answers with one object per query; a single query may
/// come back unwrapped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SerperReply {
    Batch(Vec<SerperQueryResult>),
    Single(SerperQueryResult),
}

#[derive(Debug, Default, Deserialize)]
struct SerperQueryResult {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearch {
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        results_per_query: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(USER_AGENT, timeout)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            results_per_query,
            timeout,
        })
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    #[instrument(skip_all, fields(queries = queries.len()))]
    async fn search(&self, queries: &[String]) -> Result<Vec<SearchResult>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| EventFinderError::config("Serper API key is not configured"))?;

        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let payload: Vec<SerperQuery<'_>> = queries
            .iter()
            .map(|q| SerperQuery {
                q,
                num: self.results_per_query,
            })
            .collect();

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error("serper", self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EventFinderError::api("serper", status.as_u16(), body));
        }

        let reply: SerperReply = response
            .json()
            .await
            .map_err(|e| EventFinderError::parse(format!("serper response: {e}")))?;

        let per_query = match reply {
            SerperReply::Batch(items) => items,
            SerperReply::Single(item) => vec![item],
        };

        let mut results = Vec::new();
        for (i, item) in per_query.into_iter().enumerate() {
            debug!(query = i, hits = item.organic.len(), "serper query results");
            results.extend(
                item.organic
                    .into_iter()
                    .take(self.results_per_query)
                    .map(|hit| SearchResult {
                        title: hit.title,
                        url: hit.link,
                        snippet: hit.snippet,
                        source: "serper".into(),
                    }),
            );
        }

        info!(results = results.len(), "serper search complete");
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "serper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, key: Option<&str>) -> SerperSearch {
        SerperSearch::new(
            key.map(String::from),
            &server.uri(),
            20,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_batch_search_flattens_in_query_order() {
        let server = MockServer::start().await;
        let fixture = std::fs::read_to_string("../../../fixtures/serper/batch-search.json")
            .expect("read serper fixture");

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("X-API-KEY", "test-key"))
            .and(body_json(serde_json::json!([
                {"q": "\"Jane Doe\" keynote conference", "num": 20},
                {"q": "site:meetup.com \"Jane Doe\"", "num": 20}
            ])))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture))
            .expect(1)
            .mount(&server)
            .await;

        let queries = vec![
            "\"Jane Doe\" keynote conference".to_string(),
            "site:meetup.com \"Jane Doe\"".to_string(),
        ];
        let results = client(&server, Some("test-key")).search(&queries).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].url, "https://devconf.example.com/2026/speakers/jane-doe");
        assert_eq!(results[2].url, "https://www.meetup.com/rust-nyc/events/301234567/");
        assert!(results.iter().all(|r| r.source == "serper"));
        // Missing snippet tolerated
        assert_eq!(results[1].snippet, "");
    }

    #[tokio::test]
    async fn test_results_capped_per_query() {
        let server = MockServer::start().await;
        let organic: Vec<_> = (0..5)
            .map(|i| {
                serde_json::json!({"title": format!("t{i}"), "link": format!("https://e{i}.com")})
            })
            .collect();

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "organic": organic }])),
            )
            .mount(&server)
            .await;

        let serper = SerperSearch::new(Some("k".into()), &server.uri(), 2, Duration::from_secs(5))
            .unwrap();
        let results = serper.search(&["q".to_string()]).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_http_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client(&server, Some("k"))
            .search(&["q".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EventFinderError::Api { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server, None).search(&["q".to_string()]).await.unwrap_err();
        assert!(matches!(err, EventFinderError::Config { .. }));
    }
}
