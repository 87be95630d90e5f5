//! Shared types, error model, and configuration for EventFinder.
//!
//! This crate is the foundation depended on by all other EventFinder crates.
//! It provides:
//! - [`EventFinderError`]: the unified error type
//! - Domain types ([`Event`], [`EventCandidate`], [`SearchResult`], [`EventsResponse`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExtractionConfig, ExtractionStrategy, LlmConfig, SearchConfig, SearchProviderKind,
    ServerConfig, WorkflowSettings, config_dir, config_file_path, init_config, load_config,
    load_config_from, read_api_key,
};
pub use error::{EventFinderError, Result};
pub use types::{
    Event, EventCandidate, EventType, EventTypeFilter, EventsResponse, Location,
    LocationCandidate, SearchResult, UNKNOWN_EVENT_NAME,
};
