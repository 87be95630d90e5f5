//! Firecrawl API client and the extract-based [`EventExtractor`].

use std::time::Duration;

use async_trait::async_trait;
use eventfinder_shared::{EventCandidate, EventFinderError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{EventExtractor, EventList, event_list_schema, extraction_prompt, transport_error};

const USER_AGENT: &str = concat!("EventFinder/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ExtractRequest<'a> {
    urls: &'a [String],
    prompt: String,
    schema: serde_json::Value,
}

/// Returned both by the job start call and by status polls.
#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    success: bool,
    id: Option<String>,
    status: Option<String>,
    data: Option<EventList>,
    error: Option<String>,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'static str; 1],
    #[serde(rename = "onlyMainContent")]
    only_main_content: bool,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
}

// ---------------------------------------------------------------------------
// FirecrawlClient
// ---------------------------------------------------------------------------

/// Thin client over the Firecrawl v1 REST API.
pub struct FirecrawlClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl FirecrawlClient {
    pub fn new(api_key: Option<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| EventFinderError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| EventFinderError::config("Firecrawl API key is not configured"))
    }

    async fn post<T: Serialize, R: DeserializeOwned>(&self, endpoint: &str, body: &T) -> Result<R> {
        let request = self
            .client
            .post(format!("{}{endpoint}", self.base_url))
            .bearer_auth(self.api_key()?)
            .json(body);
        self.send(request).await
    }

    async fn get<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R> {
        let request = self
            .client
            .get(format!("{}{endpoint}", self.base_url))
            .bearer_auth(self.api_key()?);
        self.send(request).await
    }

    async fn send<R: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<R> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error("firecrawl", self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EventFinderError::api("firecrawl", status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| EventFinderError::parse(format!("firecrawl response: {e}")))
    }

    /// Scrape one page as main-content markdown.
    ///
    /// Returns `Ok(None)` when the page scraped but had no content.
    #[instrument(skip(self))]
    pub async fn scrape_markdown(&self, url: &str) -> Result<Option<String>> {
        let request = ScrapeRequest {
            url,
            formats: ["markdown"],
            only_main_content: true,
        };
        let response: ScrapeResponse = self.post("/v1/scrape", &request).await?;

        if !response.success {
            return Err(EventFinderError::Extraction(format!(
                "scrape of {url} failed: {}",
                response.error.unwrap_or_else(|| "unknown error".into())
            )));
        }

        Ok(response
            .data
            .and_then(|d| d.markdown)
            .filter(|md| !md.trim().is_empty()))
    }
}

// ---------------------------------------------------------------------------
// FirecrawlExtractor
// ---------------------------------------------------------------------------

/// Scrape-and-extract in a single Firecrawl extract job.
pub struct FirecrawlExtractor {
    client: FirecrawlClient,
    poll_interval: Duration,
}

impl FirecrawlExtractor {
    pub fn new(client: FirecrawlClient, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }

    /// Poll `/v1/extract/{id}` until the job settles or the client timeout elapses.
    async fn wait_for_job(&self, id: &str) -> Result<Vec<EventCandidate>> {
        let interval = self.poll_interval.max(Duration::from_millis(1));
        let max_polls = (self.client.timeout.as_millis() / interval.as_millis()).max(1) as u64;

        for attempt in 1..=max_polls {
            tokio::time::sleep(interval).await;

            let status: ExtractResponse = self.client.get(&format!("/v1/extract/{id}")).await?;
            match status.status.as_deref() {
                Some("completed") => {
                    return Ok(status.data.map(|d| d.events).unwrap_or_default());
                }
                Some(state @ ("failed" | "cancelled")) => {
                    return Err(EventFinderError::Extraction(format!(
                        "extract job {id} {state}: {}",
                        status.error.unwrap_or_default()
                    )));
                }
                other => debug!(job = id, attempt, status = ?other, "extract job pending"),
            }
        }

        Err(EventFinderError::timeout(
            format!("firecrawl extract job {id}"),
            self.client.timeout.as_secs(),
        ))
    }
}

#[async_trait]
impl EventExtractor for FirecrawlExtractor {
    #[instrument(skip_all, fields(urls = urls.len(), person = %person))]
    async fn extract(&self, urls: &[String], person: &str) -> Result<Vec<EventCandidate>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let request = ExtractRequest {
            urls,
            prompt: extraction_prompt(person),
            schema: event_list_schema(),
        };
        let started: ExtractResponse = self.client.post("/v1/extract", &request).await?;

        if !started.success {
            return Err(EventFinderError::Extraction(
                started.error.unwrap_or_else(|| "extract request rejected".into()),
            ));
        }

        let events = match (started.data, started.id) {
            (Some(data), _) => data.events,
            (None, Some(id)) => {
                debug!(job = %id, "extract job started, polling");
                self.wait_for_job(&id).await?
            }
            (None, None) => {
                return Err(EventFinderError::Extraction(
                    "extract response carried neither data nor job id".into(),
                ));
            }
        };

        info!(events = events.len(), "firecrawl extract complete");
        Ok(events)
    }

    fn name(&self) -> &'static str {
        "firecrawl_extract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn extractor(server: &MockServer, key: Option<&str>) -> FirecrawlExtractor {
        let client =
            FirecrawlClient::new(key.map(String::from), &server.uri(), Duration::from_secs(5))
                .unwrap();
        FirecrawlExtractor::new(client, Duration::from_millis(10))
    }

    fn urls() -> Vec<String> {
        vec![
            "https://devconf.example.com/2026/speakers/jane-doe".into(),
            "https://www.meetup.com/rust-nyc/events/301234567".into(),
        ]
    }

    #[tokio::test]
    async fn test_extract_with_polling() {
        let server = MockServer::start().await;
        let completed =
            std::fs::read_to_string("../../../fixtures/firecrawl/extract-completed.json")
                .expect("read extract fixture");

        Mock::given(method("POST"))
            .and(path("/v1/extract"))
            .and(header("Authorization", "Bearer fc-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": true, "id": "job-42"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        // First poll still processing, then completed
        Mock::given(method("GET"))
            .and(path("/v1/extract/job-42"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": true, "status": "processing"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/extract/job-42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(completed))
            .mount(&server)
            .await;

        let events = extractor(&server, Some("fc-test"))
            .extract(&urls(), "Jane Doe")
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_name.as_deref(), Some("DevConf 2026"));
        assert_eq!(events[1].event_type, eventfinder_shared::EventType::Online);
    }

    #[tokio::test]
    async fn test_extract_uses_immediate_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/extract"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"events": [{"event_name": "Summit", "date": "2026-11-20"}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let events = extractor(&server, Some("k")).extract(&urls(), "Jane").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].date.as_deref(), Some("2026-11-20"));
    }

    #[tokio::test]
    async fn test_failed_job_is_extraction_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/extract"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": true, "id": "job-7"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/extract/job-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false, "status": "failed", "error": "blocked by robots"
            })))
            .mount(&server)
            .await;

        let err = extractor(&server, Some("k")).extract(&urls(), "Jane").await.unwrap_err();
        assert!(
            matches!(err, EventFinderError::Extraction(msg) if msg.contains("blocked by robots"))
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let server = MockServer::start().await;
        let err = extractor(&server, None).extract(&urls(), "Jane").await.unwrap_err();
        assert!(matches!(err, EventFinderError::Config { .. }));
    }

    #[tokio::test]
    async fn test_scrape_markdown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"markdown": "# Speakers\n\nJane Doe", "metadata": {"title": "Speakers"}}
            })))
            .mount(&server)
            .await;

        let client = FirecrawlClient::new(Some("k".into()), &server.uri(), Duration::from_secs(5))
            .unwrap();
        let md = client.scrape_markdown("https://example.com").await.unwrap();
        assert_eq!(md.as_deref(), Some("# Speakers\n\nJane Doe"));
    }
}
