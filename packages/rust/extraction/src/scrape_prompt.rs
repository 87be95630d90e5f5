//! Two-step extraction: scrape page markdown, then prompt an LLM with it.

use std::sync::Arc;

use async_trait::async_trait;
use eventfinder_shared::{EventCandidate, Result};
use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::{EventExtractor, FirecrawlClient, LlmClient, extraction_prompt};

/// Per-page cap on markdown characters fed to the LLM.
const DEFAULT_MAX_PAGE_CHARS: usize = 12_000;

pub struct ScrapeThenPromptExtractor {
    scraper: FirecrawlClient,
    llm: Arc<dyn LlmClient>,
    max_page_chars: usize,
}

impl ScrapeThenPromptExtractor {
    pub fn new(scraper: FirecrawlClient, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            scraper,
            llm,
            max_page_chars: DEFAULT_MAX_PAGE_CHARS,
        }
    }
}

/// Assemble one prompt covering every scraped page of a batch.
pub(crate) fn build_batch_prompt(
    person: &str,
    pages: &[(String, String)],
    max_chars: usize,
) -> String {
    let mut prompt = extraction_prompt(person);
    for (url, markdown) in pages {
        prompt.push_str("\n\n---\nSource: ");
        prompt.push_str(url);
        prompt.push_str("\n\n");
        prompt.push_str(truncate_chars(markdown, max_chars));
    }
    prompt
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl EventExtractor for ScrapeThenPromptExtractor {
    #[instrument(skip_all, fields(urls = urls.len(), person = %person))]
    async fn extract(&self, urls: &[String], person: &str) -> Result<Vec<EventCandidate>> {
        let scraped = join_all(urls.iter().map(|url| self.scraper.scrape_markdown(url))).await;

        let pages: Vec<(String, String)> = urls
            .iter()
            .zip(scraped)
            .filter_map(|(url, outcome)| match outcome {
                Ok(Some(markdown)) => Some((url.clone(), markdown)),
                Ok(None) => {
                    warn!(%url, "page had no content");
                    None
                }
                Err(e) => {
                    warn!(%url, error = %e, "scrape failed");
                    None
                }
            })
            .collect();

        if pages.is_empty() {
            info!("no usable pages in batch");
            return Ok(Vec::new());
        }

        let prompt = build_batch_prompt(person, &pages, self.max_page_chars);
        let events = self.llm.parse_structured(&prompt).await?;
        info!(pages = pages.len(), events = events.len(), "scrape-then-prompt complete");
        Ok(events)
    }

    fn name(&self) -> &'static str {
        "scrape_then_prompt"
    }
}
