//! Choose which search hits are worth scraping.

use std::collections::HashSet;

use eventfinder_normalize::{UrlNormalizer, get_domain_from_url};
use eventfinder_shared::SearchResult;
use tracing::{debug, info};

/// Picks at most one normalized URL per domain, skipping excluded domains,
/// capped at `top_n`.
#[derive(Debug, Clone)]
pub struct SourceSelector {
    normalizer: UrlNormalizer,
    excluded: HashSet<String>,
    top_n: usize,
}

impl SourceSelector {
    pub fn new<E, T>(exclude_domains: E, tracking_params: T, top_n: usize) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        Self {
            normalizer: UrlNormalizer::new(tracking_params),
            excluded: exclude_domains
                .into_iter()
                .map(|d| d.as_ref().trim().trim_start_matches("www.").to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            top_n,
        }
    }

    /// True for an excluded domain or any subdomain of one.
    pub fn is_excluded(&self, domain: &str) -> bool {
        if self.excluded.contains(domain) {
            return true;
        }
        domain
            .char_indices()
            .filter(|&(_, c)| c == '.')
            .any(|(i, _)| self.excluded.contains(&domain[i + 1..]))
    }

    /// Walk `results` in order and return the accepted, normalized URLs.
    pub fn select(&self, results: &[SearchResult]) -> Vec<String> {
        let mut seen_domains: HashSet<String> = HashSet::new();
        let mut selected = Vec::new();

        for result in results {
            if result.url.trim().is_empty() {
                continue;
            }
            let url = self.normalizer.normalize(&result.url);
            let domain = get_domain_from_url(&url);
            if domain.is_empty() {
                debug!(url = %result.url, "skipping URL without a domain");
                continue;
            }
            if self.is_excluded(&domain) {
                debug!(%domain, "skipping excluded domain");
                continue;
            }
            if !seen_domains.insert(domain.clone()) {
                debug!(%domain, %url, "skipping second URL for domain");
                continue;
            }
            selected.push(url);
        }

        let accepted = selected.len();
        selected.truncate(self.top_n);
        info!(
            candidates = results.len(),
            accepted,
            selected = selected.len(),
            "selected source URLs"
        );
        selected
    }
}
