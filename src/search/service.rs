//! Search service: query building, index round-trip and reconciliation

use validator::Validate;

use crate::error::Result;
use crate::models::{Page, Pagination, Review};
use crate::search::client::IndexClient;
use crate::search::config::SearchConfig;
use crate::search::document::Searchable;
use crate::search::query::{AdvancedQuery, QueryBuilder, SimpleQuery, SortOrder};
use crate::search::reconcile::reconcile;
use crate::state::Database;

/// Review search over the index and the relational store
#[derive(Clone)]
pub struct SearchService {
    client: IndexClient,
    db: Database,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(client: IndexClient, db: Database, config: SearchConfig) -> Self {
        Self { client, db, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_enabled()
    }

    /// Pagination for a request, page size clamped by configuration
    pub fn pagination(&self, page: Option<u32>, per_page: Option<u32>) -> Pagination {
        Pagination::new(page.unwrap_or(1), self.config.page_size(per_page))
    }

    /// Create the review index if it is missing
    pub async fn ensure_index(&self) -> Result<()> {
        self.client
            .ensure_index(Review::INDEX, &Review::mappings())
            .await?;
        Ok(())
    }

    /// Free-text search; `tag` further restricts the hits to one tag
    pub async fn simple_search(
        &self,
        raw: &str,
        pagination: Pagination,
        sort: SortOrder,
        tag: Option<&str>,
    ) -> Result<Page<Review>> {
        let query = SimpleQuery::parse(raw);
        tracing::debug!(
            inclusion = %query.inclusion,
            exclusion = %query.exclusion,
            tags = ?query.tags,
            %sort,
            "Simple search"
        );

        let body = QueryBuilder::simple(&query)
            .with_page(pagination)
            .with_sort(sort)
            .build();
        self.run(&body, pagination, tag).await
    }

    pub async fn advanced_search(
        &self,
        query: &AdvancedQuery,
        pagination: Pagination,
        sort: SortOrder,
    ) -> Result<Page<Review>> {
        query.validate()?;
        tracing::debug!(?query, %sort, "Advanced search");

        let body = QueryBuilder::advanced(query)
            .with_page(pagination)
            .with_sort(sort)
            .build();
        self.run(&body, pagination, None).await
    }

    async fn run(
        &self,
        body: &serde_json::Value,
        pagination: Pagination,
        tag: Option<&str>,
    ) -> Result<Page<Review>> {
        let hits = self.client.query_index(Review::INDEX, body).await?;
        if hits.total == 0 {
            return Ok(Page::empty(pagination));
        }

        let reviews = reconcile(&self.db, &hits, tag)?;
        Ok(Page::new(reviews, hits.total, pagination))
    }

    /// Push every review to the index; returns how many were sent
    pub async fn reindex(&self) -> Result<usize> {
        if !self.client.is_enabled() {
            tracing::warn!("Search is disabled, nothing to reindex");
            return Ok(0);
        }

        self.ensure_index().await?;

        let reviews = self.db.all_reviews()?;
        for review in &reviews {
            self.client
                .add_to_index(Review::INDEX, review.id(), &review.to_document())
                .await?;
        }

        tracing::info!(count = reviews.len(), "Reindexed reviews");
        Ok(reviews.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_search_is_empty() {
        let db = Database::open_in_memory().unwrap();
        let service = SearchService::new(IndexClient::disabled(), db, SearchConfig::default());
        let pagination = service.pagination(Some(2), None);

        let page = service
            .simple_search("smoke @Peat", pagination, SortOrder::Relevance, None)
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
        assert_eq!(page.page, 2);
        assert_eq!(page.per_page, 10);

        assert_eq!(service.reindex().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_advanced_search_validates() {
        let db = Database::open_in_memory().unwrap();
        let service = SearchService::new(IndexClient::disabled(), db, SearchConfig::default());
        let query = AdvancedQuery::default().with_scores(Some(90), Some(10));

        let err = service
            .advanced_search(&query, service.pagination(None, None), SortOrder::New)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::Validation(_)));
    }

    #[test]
    fn test_page_size_is_clamped() {
        let config = SearchConfig {
            max_page_size: 50,
            ..SearchConfig::default()
        };
        let service = SearchService::new(
            IndexClient::disabled(),
            Database::open_in_memory().unwrap(),
            config,
        );
        assert_eq!(service.pagination(None, Some(500)).per_page, 50);
        assert_eq!(service.pagination(Some(0), Some(0)).page, 1);
    }

    #[test]
    fn test_zero_default_page_size_is_clamped() {
        let config = SearchConfig {
            posts_per_page: 0,
            ..SearchConfig::default()
        };
        let service = SearchService::new(
            IndexClient::disabled(),
            Database::open_in_memory().unwrap(),
            config,
        );
        let pagination = service.pagination(Some(3), None);
        assert_eq!(pagination.page, 3);
        assert_eq!(pagination.per_page, 1);
    }
}
