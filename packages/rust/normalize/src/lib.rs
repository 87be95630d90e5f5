//! Canonicalization helpers used by the event discovery workflow.
//!
//! - [`urls`]: URL normalization and registrable-domain extraction, so that
//!   search results differing only by tracking params or trailing slashes
//!   compare equal.
//! - [`date`]: best-effort parsing of free-text event dates into a
//!   canonical timestamp.

pub mod date;
pub mod urls;

pub use date::{parse_date, parse_date_relative};
pub use urls::{DEFAULT_TRACKING_PARAMS, UrlNormalizer, get_domain_from_url, normalize_url};
