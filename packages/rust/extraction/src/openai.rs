//! OpenAI chat-completions client with JSON-schema structured output.

use std::time::Duration;

use async_trait::async_trait;
use eventfinder_shared::{EventCandidate, EventFinderError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{EventList, LlmClient, event_list_schema, transport_error};

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that extracts event details from a webpage.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: serde_json::Value,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
    refusal: Option<String>,
}

/// [`LlmClient`] backed by `POST {base_url}/chat/completions`.
pub struct OpenAiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EventFinderError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn parse_structured(&self, prompt: &str) -> Result<Vec<EventCandidate>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| EventFinderError::config("OpenAI API key is not configured"))?;

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            response_format: serde_json::json!({
                "type": "json_schema",
                "json_schema": { "name": "event_list", "schema": event_list_schema() }
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("openai", self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EventFinderError::api("openai", status.as_u16(), body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| EventFinderError::parse(format!("openai response: {e}")))?;

        let message = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| EventFinderError::Extraction("openai returned no choices".into()))?;

        if let Some(refusal) = message.refusal {
            return Err(EventFinderError::Extraction(format!("openai refused: {refusal}")));
        }
        let content = message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| EventFinderError::Extraction("openai returned no content".into()))?;

        let list: EventList = serde_json::from_str(&content)
            .map_err(|e| EventFinderError::parse(format!("event list JSON: {e}")))?;
        debug!(events = list.events.len(), "llm extraction parsed");
        Ok(list.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(
            Some("sk-test".into()),
            &server.uri(),
            "gpt-4o-mini",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_parse_structured_reads_message_content() {
        let server = MockServer::start().await;
        let fixture = std::fs::read_to_string("../../../fixtures/openai/chat-completion.json")
            .expect("read openai fixture");

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "response_format": {"type": "json_schema", "json_schema": {"name": "event_list"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture))
            .expect(1)
            .mount(&server)
            .await;

        let events = client(&server).parse_structured("pages...").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name.as_deref(), Some("PyData Amsterdam"));
        assert_eq!(events[0].speakers.as_deref(), Some(&["Jane Doe".to_string()][..]));
    }

    #[tokio::test]
    async fn test_refusal_is_extraction_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": null, "refusal": "no"}}]
            })))
            .mount(&server)
            .await;

        let err = client(&server).parse_structured("p").await.unwrap_err();
        assert!(matches!(err, EventFinderError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = client(&server).parse_structured("p").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
