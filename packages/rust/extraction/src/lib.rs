//! Structured event extraction from web pages.
//!
//! An [`EventExtractor`] turns a batch of page URLs into raw
//! [`EventCandidate`]s for a given speaker. Two strategies exist:
//!
//! - [`FirecrawlExtractor`]: Firecrawl's `/v1/extract` scrapes the pages and
//!   runs schema-constrained extraction in one job.
//! - [`ScrapeThenPromptExtractor`]: scrape markdown with Firecrawl, then ask an
//!   [`LlmClient`] (e.g. [`OpenAiClient`]) to extract events from it.

mod firecrawl;
mod openai;
mod scrape_prompt;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventfinder_shared::{
    EventCandidate, EventFinderError, ExtractionConfig, ExtractionStrategy, LlmConfig, Result,
    read_api_key,
};
use serde::{Deserialize, Serialize};

pub use firecrawl::{FirecrawlClient, FirecrawlExtractor};
pub use openai::OpenAiClient;
pub use scrape_prompt::ScrapeThenPromptExtractor;

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Turns a batch of URLs into event candidates where `person` is a speaker.
#[async_trait]
pub trait EventExtractor: Send + Sync {
    async fn extract(&self, urls: &[String], person: &str) -> Result<Vec<EventCandidate>>;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
}

/// An LLM that answers a prompt with an event list matching [`event_list_schema`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn parse_structured(&self, prompt: &str) -> Result<Vec<EventCandidate>>;
}

// ---------------------------------------------------------------------------
// Schema and prompts
// ---------------------------------------------------------------------------

/// Wire shape shared by every collaborator: `{"events": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventList {
    #[serde(default)]
    pub events: Vec<EventCandidate>,
}

/// JSON schema describing an event list, sent to the extraction collaborators.
pub fn event_list_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "events": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "event_name": { "type": "string" },
                        "date": { "type": "string", "description": "ISO 8601 date/time" },
                        "location": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "address": { "type": "string" },
                                "city": { "type": "string" },
                                "country": { "type": "string" }
                            },
                            "required": ["name"]
                        },
                        "url": { "type": "string" },
                        "speakers": { "type": "array", "items": { "type": "string" } },
                        "event_type": { "type": "string", "enum": ["in_person", "online", "N/A"] }
                    },
                    "required": ["event_name", "url", "speakers", "event_type", "date", "location"]
                }
            }
        },
        "required": ["events"]
    })
}

/// Instruction restricting extraction to events where `person` speaks.
pub fn extraction_prompt(person: &str) -> String {
    format!(
        "Extract upcoming events from these pages where \"{person}\" is listed as a speaker, \
         presenter, panelist or host. For each event return event_name, date (ISO 8601), \
         location {{name, address, city, country}}, url, speakers (list of names, including \
         \"{person}\") and event_type (in_person, online or N/A). Only include real events \
         that \"{person}\" takes part in; return an empty list if there are none."
    )
}

// ---------------------------------------------------------------------------
// Construction from config
// ---------------------------------------------------------------------------

/// Build the extractor selected by `[extraction].strategy`.
///
/// Missing API keys do not fail here; the clients report them on each call.
pub fn extractor_from_config(
    extraction: &ExtractionConfig,
    llm: &LlmConfig,
) -> Result<Arc<dyn EventExtractor>> {
    let firecrawl = FirecrawlClient::new(
        read_api_key(&extraction.api_key_env),
        &extraction.base_url,
        Duration::from_secs(extraction.timeout_secs),
    )?;

    let extractor: Arc<dyn EventExtractor> = match extraction.strategy {
        ExtractionStrategy::Extract => Arc::new(FirecrawlExtractor::new(
            firecrawl,
            Duration::from_millis(extraction.poll_interval_ms),
        )),
        ExtractionStrategy::ScrapeThenPrompt => {
            let llm = OpenAiClient::new(
                read_api_key(&llm.api_key_env),
                &llm.base_url,
                &llm.model,
                Duration::from_secs(llm.timeout_secs),
            )?;
            Arc::new(ScrapeThenPromptExtractor::new(firecrawl, Arc::new(llm)))
        }
    };
    Ok(extractor)
}

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_requires_events() {
        let schema = event_list_schema();
        assert_eq!(schema["required"][0], "events");
        let item = &schema["properties"]["events"]["items"];
        let enum_values = &item["properties"]["event_type"]["enum"];
        assert_eq!(enum_values.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_prompt_names_person() {
        let prompt = extraction_prompt("Grace Hopper");
        assert!(prompt.contains("\"Grace Hopper\" is listed as a speaker"));
    }

    #[test]
    fn test_event_list_tolerates_loose_candidates() {
        let list: EventList = serde_json::from_str(
            r#"{"events": [
                {"event_name": "RustConf", "location": "Portland, OR", "event_type": "N/A"},
                {"event_name": "Online Meetup", "event_type": "virtual", "speakers": ["Ann"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(list.events.len(), 2);
        assert!(list.events[0].speakers.is_none());
        assert_eq!(list.events[1].event_type, eventfinder_shared::EventType::Online);
    }

    #[test]
    fn test_extractor_from_config_selects_strategy() {
        let mut extraction = ExtractionConfig::default();
        let llm = LlmConfig::default();
        assert_eq!(extractor_from_config(&extraction, &llm).unwrap().name(), "firecrawl_extract");

        extraction.strategy = ExtractionStrategy::ScrapeThenPrompt;
        assert_eq!(
            extractor_from_config(&extraction, &llm).unwrap().name(),
            "scrape_then_prompt"
        );
    }
}
