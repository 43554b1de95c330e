//! Search configuration

use serde::{Deserialize, Serialize};

/// Search index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the Elasticsearch-compatible service.
    /// `None` disables indexing and search entirely.
    #[serde(default)]
    pub elasticsearch_url: Option<String>,

    /// Prepended to every index name, so several deployments can share a cluster
    #[serde(default)]
    pub index_prefix: String,

    /// Per-request timeout towards the index service
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Default page size for listings and search results
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u32,

    /// Upper bound on a client-requested page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            elasticsearch_url: None,
            index_prefix: String::new(),
            timeout_secs: default_timeout_secs(),
            posts_per_page: default_posts_per_page(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl SearchConfig {
    /// Clamp a requested page size into `1..=max_page_size`,
    /// falling back to `posts_per_page`
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.posts_per_page)
            .clamp(1, self.max_page_size.max(1))
    }
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_posts_per_page() -> u32 {
    10
}

fn default_max_page_size() -> u32 {
    100
}
