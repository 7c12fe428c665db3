//! Product source interface and resolver

use std::sync::Arc;

use async_trait::async_trait;

use crate::shared::errors::SourceError;
use crate::shared::types::ProductSnapshot;

/// Common interface for all product page sources
#[async_trait]
pub trait ProductSource: Send + Sync {
    fn source_key(&self) -> &'static str;

    fn can_handle(&self, url: &str) -> bool;

    async fn fetch(&self, url: &str) -> Result<ProductSnapshot, SourceError>;
}

/// Picks the source responsible for a URL. First match wins.
pub struct SourceResolver {
    sources: Vec<Arc<dyn ProductSource>>,
}

impl SourceResolver {
    pub fn new(sources: Vec<Arc<dyn ProductSource>>) -> Self {
        Self { sources }
    }

    pub fn resolve(&self, url: &str) -> Option<Arc<dyn ProductSource>> {
        self.sources.iter().find(|s| s.can_handle(url)).cloned()
    }

    /// Canonicalize a user-supplied URL: drop the fragment, tracking query
    /// parameters and a trailing slash, so the same product stored twice
    /// compares equal.
    pub fn normalize_url(&self, url: &str) -> String {
        let trimmed = url.trim();
        let mut parsed = match reqwest::Url::parse(trimmed) {
            Ok(u) => u,
            Err(_) => return trimmed.to_string(),
        };

        parsed.set_fragment(None);

        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(k, _)| !is_tracking_param(k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            let query = kept
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            parsed.set_query(Some(&query));
        }

        parsed.to_string().trim_end_matches('/').to_string()
    }
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_")
        || key == "from"
        || key == "ref"
        || key == "fbclid"
        || key == "gclid"
}
