//! Turns ranked index hits back into rows from the relational store

use rusqlite::types::Value as SqlValue;

use crate::error::Result;
use crate::models::{title_case, Review};
use crate::search::client::SearchHits;
use crate::state::{queries, Database};

/// A review query restricted to, and ordered by, an explicit id list
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Build the keyed query for `ids`.
///
/// Rows come back in the order of `ids` through a `CASE` rank expression.
/// With `tag`, only reviews carrying that tag are kept.
pub fn keyed_review_query(ids: &[i64], tag: Option<&str>) -> KeyedQuery {
    let mut params: Vec<SqlValue> = ids.iter().map(|id| SqlValue::Integer(*id)).collect();
    let placeholders: Vec<String> = (1..=ids.len()).map(|n| format!("?{}", n)).collect();
    let ranks: Vec<String> = (1..=ids.len())
        .map(|n| format!("WHEN ?{} THEN {}", n, n - 1))
        .collect();

    let mut sql = format!("WHERE r.id IN ({})", placeholders.join(", "));

    if let Some(tag) = tag.map(title_case).filter(|t| !t.is_empty()) {
        params.push(SqlValue::Text(tag));
        sql.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM review_tags rt JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.review_id = r.id AND t.name = ?{})",
            params.len()
        ));
    }

    sql.push_str(&format!(" ORDER BY CASE r.id {} END", ranks.join(" ")));

    KeyedQuery { sql, params }
}

/// Source of reviews for a keyed query
pub trait KeyedSource {
    fn fetch_keyed(&self, query: &KeyedQuery) -> Result<Vec<Review>>;
}

impl KeyedSource for Database {
    fn fetch_keyed(&self, query: &KeyedQuery) -> Result<Vec<Review>> {
        self.read(|conn| queries::select_reviews(conn, &query.sql, &query.params))
    }
}

/// Load the reviews behind `hits`, in hit order.
///
/// Nothing is queried when the index reported no matches.
pub fn reconcile(
    source: &impl KeyedSource,
    hits: &SearchHits,
    tag: Option<&str>,
) -> Result<Vec<Review>> {
    if hits.total == 0 || hits.ids.is_empty() {
        return Ok(Vec::new());
    }

    source.fetch_keyed(&keyed_review_query(&hits.ids, tag))
}
