//! URL canonicalization.
//!
//! Two URLs that differ only by tracking params, query order, fragment or
//! trailing slashes normalize to the same string, so source deduplication can
//! rely on plain string equality.

use std::collections::HashSet;

use url::{Url, form_urlencoded};

/// Query parameters stripped when no explicit list is configured.
pub const DEFAULT_TRACKING_PARAMS: &[&str] = &[
    "srsltid",
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
];

/// Normalizes URLs against a fixed set of tracking parameters.
#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    tracking_params: HashSet<String>,
}

impl Default for UrlNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKING_PARAMS.iter().copied())
    }
}

impl UrlNormalizer {
    /// Build a normalizer stripping the given parameter names (matched case-insensitively).
    pub fn new<I, S>(tracking_params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tracking_params: tracking_params
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Canonicalize `url`.
    ///
    /// Lowercases everything, drops the fragment, drops tracking and blank
    /// query params, sorts the remaining params by key (stable, so repeated
    /// keys keep their order) and strips trailing slashes from the path.
    /// Empty input yields an empty string. Never fails.
    pub fn normalize(&self, url: &str) -> String {
        let lowered = url.trim().to_lowercase();
        if lowered.is_empty() {
            return String::new();
        }

        let without_fragment = match lowered.split_once('#') {
            Some((head, _)) => head,
            None => lowered.as_str(),
        };
        let (base, query) = match without_fragment.split_once('?') {
            Some((base, query)) => (base, query),
            None => (without_fragment, ""),
        };
        let base = base.trim_end_matches('/');

        let mut params: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .filter(|(k, _)| !self.tracking_params.contains(k))
            .collect();
        params.sort_by(|a, b| a.0.cmp(&b.0));

        if params.is_empty() {
            return base.to_string();
        }

        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        format!("{base}?{query}")
    }
}

/// Normalize with [`DEFAULT_TRACKING_PARAMS`].
pub fn normalize_url(url: &str) -> String {
    UrlNormalizer::default().normalize(url)
}

/// Lowercased host of `url` with one leading `www.` removed.
///
/// Returns an empty string when the URL cannot be parsed or has no host.
pub fn get_domain_from_url(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    if lowered.is_empty() {
        return String::new();
    }

    let Ok(parsed) = Url::parse(&lowered) else {
        tracing::debug!(url, "unparseable URL, no domain");
        return String::new();
    };

    match parsed.host_str() {
        Some(host) => host.strip_prefix("www.").unwrap_or(host).to_string(),
        None => String::new(),
    }
}
