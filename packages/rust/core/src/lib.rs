//! Event discovery workflow for EventFinder.
//!
//! This crate ties search, source selection, extraction and post-processing
//! into one request-scoped pipeline ([`EventFinder`]):
//!
//! name → queries → search → URL selection → batched extraction →
//! date normalization, type filter, dedup, past-event drop, sort.

pub mod clock;
pub mod pipeline;
pub mod postprocess;
pub mod retry;
pub mod selection;

pub use clock::{Clock, FixedClock, SystemClock};
pub use pipeline::{
    BatchReport, EventFinder, ProgressReporter, SilentProgress, StageOutcome, WorkflowConfig,
    WorkflowReport,
};
pub use retry::RetryPolicy;
pub use selection::SourceSelector;
