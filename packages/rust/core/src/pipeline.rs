//! End-to-end discovery workflow: name → search → select → extract → post-process.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use eventfinder_extraction::EventExtractor;
use eventfinder_search::{DUCKDUCKGO_QUERY_PAUSE, QUERY_TEMPLATES, SearchProvider, build_queries};
use eventfinder_shared::{
    AppConfig, EventCandidate, EventFinderError, EventTypeFilter, EventsResponse,
    ExtractionStrategy, Result, SearchProviderKind, SearchResult,
};

use crate::clock::{Clock, SystemClock};
use crate::postprocess::post_process;
use crate::retry::RetryPolicy;
use crate::selection::SourceSelector;

/// Outcome of a stage: its value, or the reason it degraded to empty.
pub type StageOutcome<T> = Result<T>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for one [`EventFinder`].
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Maximum source URLs sent to extraction.
    pub top_n: usize,
    pub exclude_domains: Vec<String>,
    pub tracking_params: Vec<String>,
    /// URLs per extraction call.
    pub batch_size: usize,
    /// Upper bound on concurrent extraction calls.
    pub max_concurrency: usize,
    /// Budget for one search attempt.
    pub search_timeout: Duration,
    /// Budget for one extraction batch attempt.
    pub extraction_timeout: Duration,
    pub search_retry: RetryPolicy,
    pub extraction_retry: RetryPolicy,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

impl WorkflowConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let per_request = Duration::from_secs(config.search.timeout_secs);
        let search_timeout = match config.search.provider {
            SearchProviderKind::Serper => per_request,
            SearchProviderKind::Duckduckgo => duckduckgo_budget(per_request),
        };
        let extraction_secs = match config.extraction.strategy {
            ExtractionStrategy::Extract => config.extraction.timeout_secs,
            ExtractionStrategy::ScrapeThenPrompt => {
                config.extraction.timeout_secs + config.llm.timeout_secs
            }
        };

        Self {
            top_n: config.workflow.top_n,
            exclude_domains: config.workflow.exclude_domains.clone(),
            tracking_params: config.workflow.tracking_params.clone(),
            batch_size: config.extraction.batch_size,
            max_concurrency: config.extraction.max_concurrency,
            search_timeout,
            extraction_timeout: Duration::from_secs(extraction_secs),
            search_retry: RetryPolicy::new(
                config.search.max_attempts,
                Duration::from_millis(config.search.backoff_ms),
            ),
            extraction_retry: RetryPolicy::new(
                config.extraction.max_attempts,
                Duration::from_millis(config.extraction.backoff_ms),
            ),
        }
    }
}

/// Whole-sweep budget for the sequential DuckDuckGo provider: every query at
/// its own timeout, the pauses between them, and one extra request of slack.
fn duckduckgo_budget(per_request: Duration) -> Duration {
    let queries = QUERY_TEMPLATES.len() as u32;
    per_request * (queries + 1) + DUCKDUCKGO_QUERY_PAUSE * queries.saturating_sub(1)
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What one extraction batch produced.
#[derive(Debug)]
pub struct BatchReport {
    /// Zero-based batch position; merge order follows it.
    pub index: usize,
    pub urls: Vec<String>,
    pub outcome: StageOutcome<Vec<EventCandidate>>,
}

/// Everything a single workflow run did, for inspection in tests and the CLI.
#[derive(Debug)]
pub struct WorkflowReport {
    pub queries: Vec<String>,
    pub search: StageOutcome<Vec<SearchResult>>,
    pub selected_urls: Vec<String>,
    pub batches: Vec<BatchReport>,
    pub response: EventsResponse,
    pub elapsed: Duration,
}

impl WorkflowReport {
    /// Batches whose extraction call failed.
    pub fn failed_batches(&self) -> impl Iterator<Item = &BatchReport> {
        self.batches.iter().filter(|b| b.outcome.is_err())
    }
}

/// Progress callback for reporting workflow status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new stage.
    fn stage(&self, name: &str);
    /// Called once the response is ready.
    fn done(&self, report: &WorkflowReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _name: &str) {}
    fn done(&self, _report: &WorkflowReport) {}
}

// ---------------------------------------------------------------------------
// EventFinder
// ---------------------------------------------------------------------------

/// The discovery workflow with its injected collaborators.
///
/// Stateless across requests; one instance can serve any number of
/// concurrent calls.
pub struct EventFinder {
    search: Arc<dyn SearchProvider>,
    extractor: Arc<dyn EventExtractor>,
    clock: Arc<dyn Clock>,
    selector: SourceSelector,
    config: WorkflowConfig,
}

impl EventFinder {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        extractor: Arc<dyn EventExtractor>,
        config: WorkflowConfig,
    ) -> Self {
        let selector = SourceSelector::new(
            &config.exclude_domains,
            &config.tracking_params,
            config.top_n,
        );
        Self {
            search,
            extractor,
            clock: Arc::new(SystemClock),
            selector,
            config,
        }
    }

    /// Replace the clock used to decide what counts as a past event.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Find upcoming events where `name` speaks.
    ///
    /// `event_type` values other than `in_person`/`online` are ignored. A blank
    /// name is the only input that fails; collaborator failures degrade to an
    /// empty response.
    pub async fn find_upcoming_events(
        &self,
        name: &str,
        event_type: Option<&str>,
    ) -> Result<EventsResponse> {
        let filter = EventTypeFilter::parse_lenient(event_type);
        if filter.is_none() && event_type.is_some_and(|raw| !raw.trim().is_empty()) {
            warn!(event_type, "ignoring invalid event type filter");
        }
        let report = self.run_with_report(name, filter, &SilentProgress).await?;
        Ok(report.response)
    }

    /// Run the workflow and keep every intermediate outcome.
    #[instrument(skip_all, fields(name = %name, filter = ?filter))]
    pub async fn run_with_report(
        &self,
        name: &str,
        filter: Option<EventTypeFilter>,
        progress: &dyn ProgressReporter,
    ) -> Result<WorkflowReport> {
        if name.trim().is_empty() {
            return Err(EventFinderError::validation("Parameter 'name' is required"));
        }
        let start = Instant::now();

        // --- Search ---
        progress.stage("Searching the web");
        let queries = build_queries(name);
        let search = self.search_stage(&queries).await;

        // --- Selection ---
        let selected_urls = match &search {
            Ok(results) => self.selector.select(results),
            Err(e) => {
                warn!(
                    error = %e,
                    provider = self.search.name(),
                    "search failed, continuing with no results"
                );
                Vec::new()
            }
        };

        let mut report = WorkflowReport {
            queries,
            search,
            selected_urls,
            batches: Vec::new(),
            response: EventsResponse::empty(name),
            elapsed: Duration::ZERO,
        };

        if report.selected_urls.is_empty() {
            info!("no source URLs selected");
            return Ok(self.finish(report, start, progress));
        }

        // --- Extraction ---
        progress.stage("Extracting events");
        report.batches = self.extraction_stage(&report.selected_urls, name).await;

        let candidates: Vec<EventCandidate> = report
            .batches
            .iter()
            .filter_map(|batch| batch.outcome.as_ref().ok())
            .flatten()
            .cloned()
            .collect();

        if candidates.is_empty() {
            info!("extraction produced no candidates");
            return Ok(self.finish(report, start, progress));
        }

        // --- Post-processing ---
        progress.stage("Filtering and sorting events");
        let events = post_process(candidates, filter, self.clock.today());
        report.response = EventsResponse::new(name, events);

        Ok(self.finish(report, start, progress))
    }

    fn finish(
        &self,
        mut report: WorkflowReport,
        start: Instant,
        progress: &dyn ProgressReporter,
    ) -> WorkflowReport {
        report.elapsed = start.elapsed();
        info!(
            events = report.response.count(),
            sources = report.selected_urls.len(),
            failed_batches = report.failed_batches().count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "event discovery complete"
        );
        progress.done(&report);
        report
    }

    /// Run every query through the provider under the search retry policy.
    #[instrument(skip_all, fields(provider = self.search.name(), queries = queries.len()))]
    async fn search_stage(&self, queries: &[String]) -> StageOutcome<Vec<SearchResult>> {
        let timeout = self.config.search_timeout;
        let search = self.search.as_ref();

        let results = self
            .config
            .search_retry
            .run("search", move || async move {
                tokio::time::timeout(timeout, search.search(queries))
                    .await
                    .map_err(|_| EventFinderError::timeout("search", timeout.as_secs()))?
            })
            .await?;

        info!(results = results.len(), "search stage complete");
        Ok(results)
    }

    /// Extract every batch concurrently, bounded by `max_concurrency`.
    ///
    /// Reports come back in batch order whatever the completion order.
    #[instrument(skip_all, fields(urls = urls.len()))]
    async fn extraction_stage(&self, urls: &[String], person: &str) -> Vec<BatchReport> {
        let semaphore = Semaphore::new(self.config.max_concurrency.max(1));
        let semaphore = &semaphore;

        let batches = urls
            .chunks(self.config.batch_size.max(1))
            .enumerate()
            .map(|(index, batch)| async move {
                let outcome = self.extract_batch(batch, person, semaphore).await;
                match &outcome {
                    Ok(events) if events.is_empty() => {
                        info!(batch = index, "batch returned no events")
                    }
                    Ok(events) => info!(batch = index, events = events.len(), "batch extracted"),
                    Err(e) => warn!(batch = index, error = %e, "batch extraction failed"),
                }
                BatchReport {
                    index,
                    urls: batch.to_vec(),
                    outcome,
                }
            });

        join_all(batches).await
    }

    async fn extract_batch(
        &self,
        urls: &[String],
        person: &str,
        semaphore: &Semaphore,
    ) -> Result<Vec<EventCandidate>> {
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|_| EventFinderError::Extraction("extraction limiter closed".into()))?;

        let timeout = self.config.extraction_timeout;
        let extractor = self.extractor.as_ref();

        self.config
            .extraction_retry
            .run("extraction batch", move || async move {
                tokio::time::timeout(timeout, extractor.extract(urls, person))
                    .await
                    .map_err(|_| EventFinderError::timeout("extraction batch", timeout.as_secs()))?
            })
            .await
    }
}
