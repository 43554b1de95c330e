//! Elasticsearch REST client

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::search::config::SearchConfig;
use crate::search::error::{SearchError, SearchResult};

/// Ids and total count from one search request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHits {
    /// Primary keys, in ranked order
    pub ids: Vec<i64>,

    /// Matches across all pages
    pub total: u64,
}

impl SearchHits {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Operations the application needs from an index service
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Create the index with `mappings` unless it already exists
    async fn ensure_index(&self, index: &str, mappings: &Value) -> SearchResult<()>;

    /// Create or replace a document
    async fn index_document(&self, index: &str, id: i64, document: &Value) -> SearchResult<()>;

    /// Remove a document; a missing document is not an error
    async fn delete_document(&self, index: &str, id: i64) -> SearchResult<()>;

    /// Run a search request body
    async fn search(&self, index: &str, body: &Value) -> SearchResult<SearchHits>;
}

/// [`SearchBackend`] speaking the Elasticsearch 7+ REST API
pub struct ElasticsearchBackend {
    client: Client,
    base_url: String,
}

impl ElasticsearchBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> SearchResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            SearchError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl SearchBackend for ElasticsearchBackend {
    async fn ensure_index(&self, index: &str, mappings: &Value) -> SearchResult<()> {
        let response = self
            .client
            .put(self.url(index))
            .json(&serde_json::json!({ "mappings": mappings }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(index, "Created search index");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception") {
            tracing::debug!(index, "Search index already exists");
            return Ok(());
        }

        Err(SearchError::IndexInitFailed(format!("{}: {}", status, body)))
    }

    async fn index_document(&self, index: &str, id: i64, document: &Value) -> SearchResult<()> {
        let response = self
            .client
            .put(self.url(&format!("{}/_doc/{}", index, id)))
            .json(document)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::IndexingFailed(format!("{}: {}", status, body)));
        }
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: i64) -> SearchResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("{}/_doc/{}", index, id)))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SearchError::DeletionFailed(format!("{}: {}", status, body)))
    }

    async fn search(&self, index: &str, body: &Value) -> SearchResult<SearchHits> {
        let response = self
            .client
            .post(self.url(&format!("{}/_search", index)))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SearchError::SearchFailed(format!("{}: {}", status, text)));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| SearchError::MalformedResponse(e.to_string()))?;
        parse_hits(&payload)
    }
}

/// Pull document ids and the total out of a `_search` response
pub fn parse_hits(payload: &Value) -> SearchResult<SearchHits> {
    let hits = payload
        .get("hits")
        .ok_or_else(|| SearchError::MalformedResponse("missing `hits`".to_string()))?;

    // 7.x reports {"value": n, "relation": ..}; 6.x reported a bare number
    let total = match hits.get("total") {
        Some(Value::Object(total)) => total.get("value").and_then(Value::as_u64),
        Some(other) => other.as_u64(),
        None => None,
    }
    .ok_or_else(|| SearchError::MalformedResponse("missing `hits.total`".to_string()))?;

    let ids = hits
        .get("hits")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|hit| {
            hit.get("_id")
                .and_then(Value::as_str)
                .and_then(|id| id.parse::<i64>().ok())
                .ok_or_else(|| SearchError::MalformedResponse(format!("bad hit id in {}", hit)))
        })
        .collect::<SearchResult<Vec<_>>>()?;

    Ok(SearchHits { ids, total })
}

/// Handle to the index, shared across requests.
///
/// With no endpoint configured the client is disabled: writes do nothing
/// and searches return no hits, without any I/O.
#[derive(Clone)]
pub struct IndexClient {
    backend: Option<Arc<dyn SearchBackend>>,
    prefix: String,
}

impl IndexClient {
    pub fn disabled() -> Self {
        Self {
            backend: None,
            prefix: String::new(),
        }
    }

    pub fn new(backend: Arc<dyn SearchBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend: Some(backend),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &SearchConfig) -> SearchResult<Self> {
        match config.elasticsearch_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                let backend = ElasticsearchBackend::new(
                    url,
                    Duration::from_secs(config.timeout_secs.max(1)),
                )?;
                tracing::info!(url, "Search index enabled");
                Ok(Self::new(Arc::new(backend), config.index_prefix.clone()))
            }
            _ => {
                tracing::info!("No search endpoint configured, search is disabled");
                Ok(Self::disabled())
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn index_name(&self, index: &str) -> String {
        format!("{}{}", self.prefix, index)
    }

    pub async fn ensure_index(&self, index: &str, mappings: &Value) -> SearchResult<()> {
        match &self.backend {
            Some(backend) => backend.ensure_index(&self.index_name(index), mappings).await,
            None => Ok(()),
        }
    }

    pub async fn add_to_index(&self, index: &str, id: i64, document: &Value) -> SearchResult<()> {
        match &self.backend {
            Some(backend) => {
                backend
                    .index_document(&self.index_name(index), id, document)
                    .await
            }
            None => Ok(()),
        }
    }

    pub async fn remove_from_index(&self, index: &str, id: i64) -> SearchResult<()> {
        match &self.backend {
            Some(backend) => backend.delete_document(&self.index_name(index), id).await,
            None => Ok(()),
        }
    }

    pub async fn query_index(&self, index: &str, body: &Value) -> SearchResult<SearchHits> {
        match &self.backend {
            Some(backend) => backend.search(&self.index_name(index), body).await,
            None => Ok(SearchHits::empty()),
        }
    }
}
