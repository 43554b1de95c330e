//! Whisky catalogue: distilleries, whiskies and tasting reviews, with
//! review search mirrored into Elasticsearch.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod search;
pub mod state;
pub mod telemetry;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::models::Review;
use crate::search::{IndexClient, IndexSync, SearchService};
use crate::state::Database;

/// Open the database with index sync attached, and the search service over it
pub fn connect(config: &Config) -> Result<(Database, SearchService)> {
    let client = IndexClient::from_config(&config.search)?;

    let db = if config.database.path.as_os_str() == ":memory:" {
        Database::open_in_memory()?
    } else {
        Database::open(&config.database.path)?
    };
    let db = db.with_hook(Arc::new(IndexSync::<Review>::new(client.clone())));

    let search = SearchService::new(client, db.clone(), config.search.clone());
    Ok((db, search))
}
