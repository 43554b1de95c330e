//! Full-text search over reviews, backed by an external Elasticsearch index
//!
//! The relational store stays authoritative. The index only holds
//! denormalised copies of reviews and answers "which ids, in what order":
//!
//! ```text
//!   write ──► Database::write ──► IndexSync (commit hook) ──► index upsert/delete
//!
//!   query ──► SimpleQuery / AdvancedQuery ──► QueryBuilder ──► IndexClient
//!                                                                  │ ids + total
//!                                                                  ▼
//!                                                 reconcile ──► reviews in hit order
//! ```
//!
//! With no `search.elasticsearch_url` configured, every index operation is a
//! no-op and searches return an empty page.
//!
//! # Example
//!
//! ```no_run
//! use whisky_catalog::models::Pagination;
//! use whisky_catalog::search::{IndexClient, SearchConfig, SearchService, SortOrder};
//! use whisky_catalog::state::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SearchConfig::default();
//!     let db = Database::open_in_memory()?;
//!     let search = SearchService::new(IndexClient::from_config(&config)?, db, config);
//!
//!     let page = search
//!         .simple_search("smoke @Peat -cheap", Pagination::new(1, 10), SortOrder::New, None)
//!         .await?;
//!     println!("Found {} reviews", page.total);
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod document;
mod error;
mod query;
mod reconcile;
mod service;
mod sync;

pub use client::{parse_hits, ElasticsearchBackend, IndexClient, SearchBackend, SearchHits};
pub use config::SearchConfig;
pub use document::Searchable;
pub use error::{SearchError, SearchResult};
pub use query::{AdvancedQuery, QueryBuilder, SimpleQuery, SortOrder};
pub use reconcile::{keyed_review_query, reconcile, KeyedQuery, KeyedSource};
pub use service::SearchService;
pub use sync::IndexSync;
