//! Application configuration for EventFinder.
//!
//! User config lives at `~/.eventfinder/eventfinder.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file; each section names the environment
//! variable that holds its key.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EventFinderError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "eventfinder.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".eventfinder";

// ---------------------------------------------------------------------------
// Config structs (matching eventfinder.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Search collaborator settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Scrape/extract collaborator settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// LLM settings (scrape-then-prompt strategy only).
    #[serde(default)]
    pub llm: LlmConfig,

    /// Source selection settings.
    #[serde(default)]
    pub workflow: WorkflowSettings,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Which search backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchProviderKind {
    Serper,
    Duckduckgo,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: SearchProviderKind,

    /// Name of the env var holding the Serper API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Organic results requested (and kept) per query.
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Attempts for the whole search stage before degrading to empty.
    #[serde(default = "default_search_attempts")]
    pub max_attempts: u32,

    /// Initial backoff between attempts; doubles each retry.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key_env: default_search_key_env(),
            base_url: default_search_base_url(),
            results_per_query: default_results_per_query(),
            timeout_secs: default_search_timeout(),
            max_attempts: default_search_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_search_provider() -> SearchProviderKind {
    SearchProviderKind::Serper
}
fn default_search_key_env() -> String {
    "SERPER_API_KEY".into()
}
fn default_search_base_url() -> String {
    "https://google.serper.dev".into()
}
fn default_results_per_query() -> usize {
    20
}
fn default_search_timeout() -> u64 {
    10
}
fn default_search_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    500
}

/// How event records are pulled out of the selected pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// One schema-constrained scrape-and-extract call per batch.
    Extract,
    /// Scrape markdown first, then prompt the LLM with it.
    ScrapeThenPrompt,
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_strategy")]
    pub strategy: ExtractionStrategy,

    /// Name of the env var holding the Firecrawl API key.
    #[serde(default = "default_firecrawl_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_firecrawl_base_url")]
    pub base_url: String,

    /// URLs per extraction call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound on in-flight batch calls.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,

    /// Delay between extract-job status polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Attempts per batch. One means no retry.
    #[serde(default = "default_extraction_attempts")]
    pub max_attempts: u32,

    /// Initial backoff between batch attempts; doubles each retry.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            api_key_env: default_firecrawl_key_env(),
            base_url: default_firecrawl_base_url(),
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_extraction_timeout(),
            poll_interval_ms: default_poll_interval(),
            max_attempts: default_extraction_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_strategy() -> ExtractionStrategy {
    ExtractionStrategy::Extract
}
fn default_firecrawl_key_env() -> String {
    "FIRECRAWL_API_KEY".into()
}
fn default_firecrawl_base_url() -> String {
    "https://api.firecrawl.dev".into()
}
fn default_batch_size() -> usize {
    5
}
fn default_max_concurrency() -> usize {
    8
}
fn default_extraction_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    1000
}
fn default_extraction_attempts() -> u32 {
    1
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the OpenAI API key.
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_llm_key_env(),
            model: default_model(),
            base_url: default_llm_base_url(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_llm_timeout() -> u64 {
    60
}

/// `[workflow]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Maximum number of source URLs sent to extraction.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Registrable domains never scraped (social media, marketplaces, job boards).
    #[serde(default = "default_exclude_domains")]
    pub exclude_domains: Vec<String>,

    /// Query parameters stripped during URL normalization.
    #[serde(default = "default_tracking_params")]
    pub tracking_params: Vec<String>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            exclude_domains: default_exclude_domains(),
            tracking_params: default_tracking_params(),
        }
    }
}

fn default_top_n() -> usize {
    20
}

fn default_exclude_domains() -> Vec<String> {
    [
        "facebook.com",
        "twitter.com",
        "x.com",
        "linkedin.com",
        "instagram.com",
        "youtube.com",
        "tiktok.com",
        "reddit.com",
        "pinterest.com",
        "snapchat.com",
        "discord.com",
        "telegram.org",
        "whatsapp.com",
        "wikipedia.org",
        "amazon.com",
        "ebay.com",
        "craigslist.org",
        "indeed.com",
        "glassdoor.com",
        "monster.com",
        "careerbuilder.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_tracking_params() -> Vec<String> {
    [
        "srsltid",
        "utm_source",
        "utm_medium",
        "utm_campaign",
        "utm_term",
        "utm_content",
        "gclid",
        "fbclid",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.eventfinder/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| EventFinderError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.eventfinder/eventfinder.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| EventFinderError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        EventFinderError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EventFinderError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| EventFinderError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EventFinderError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read an API key from the named env var.
///
/// Returns `None` (and logs) when the variable is unset or empty; clients built
/// without a key report [`EventFinderError::Config`] on every call.
pub fn read_api_key(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Some(val.trim().to_string()),
        _ => {
            tracing::warn!(var = var_name, "API key not set, collaborator will be disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("SERPER_API_KEY"));
        assert!(toml_str.contains("FIRECRAWL_API_KEY"));
        assert!(toml_str.contains("facebook.com"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.workflow.top_n, 20);
        assert_eq!(parsed.extraction.batch_size, 5);
        assert_eq!(parsed.extraction.strategy, ExtractionStrategy::Extract);
        assert_eq!(parsed.search.provider, SearchProviderKind::Serper);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[search]
provider = "duckduckgo"

[extraction]
strategy = "scrape_then_prompt"
max_concurrency = 2
backoff_ms = 250

[server]
port = 9090
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.search.provider, SearchProviderKind::Duckduckgo);
        assert_eq!(config.search.max_attempts, 3);
        assert_eq!(config.extraction.strategy, ExtractionStrategy::ScrapeThenPrompt);
        assert_eq!(config.extraction.max_concurrency, 2);
        assert_eq!(config.extraction.batch_size, 5);
        assert_eq!(config.extraction.backoff_ms, 250);
        assert_eq!(config.search.backoff_ms, 500);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn missing_api_key_is_none() {
        // Use a unique env var name to avoid interfering with other tests
        assert!(read_api_key("EF_TEST_NONEXISTENT_KEY_12345").is_none());
    }
}
