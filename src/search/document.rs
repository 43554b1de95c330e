//! Index documents and the capability trait for indexed entities

use chrono::SecondsFormat;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::models::Review;
use crate::state::{queries, EntityKind};

/// An entity mirrored into the search index.
///
/// The index document is a flat object built from `searchable_fields`, keyed
/// by the entity's integer primary key.
pub trait Searchable: Sized + Send + Sync + 'static {
    /// Index name, before the configured prefix is applied
    const INDEX: &'static str;

    /// Which change-set entries belong to this type
    const ENTITY: EntityKind;

    /// Field names copied into the index document
    fn searchable_fields() -> &'static [&'static str];

    /// Stable primary key, used as the document id
    fn id(&self) -> i64;

    /// Value of one searchable field, `None` for unknown names
    fn field_value(&self, field: &str) -> Option<Value>;

    /// Field mappings sent when the index is created
    fn mappings() -> Value;

    /// Load the rows for `ids` through an open connection
    fn fetch(conn: &Connection, ids: &[i64]) -> Result<Vec<Self>>;

    /// Build the index document: exactly the searchable fields
    fn to_document(&self) -> Value {
        let mut doc = Map::new();
        for field in Self::searchable_fields() {
            if let Some(value) = self.field_value(field) {
                doc.insert((*field).to_string(), value);
            }
        }
        Value::Object(doc)
    }
}

const REVIEW_FIELDS: &[&str] = &[
    "nose",
    "palate",
    "finish",
    "score",
    "timestamp",
    "author",
    "whisky",
    "distillery",
    "tags",
];

impl Searchable for Review {
    const INDEX: &'static str = "reviews";
    const ENTITY: EntityKind = EntityKind::Review;

    fn searchable_fields() -> &'static [&'static str] {
        REVIEW_FIELDS
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn field_value(&self, field: &str) -> Option<Value> {
        let value = match field {
            "nose" => json!(self.nose),
            "palate" => json!(self.palate),
            "finish" => json!(self.finish),
            "score" => json!(self.score),
            "timestamp" => json!(self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)),
            "author" => json!(self.author),
            "whisky" => json!(self.whisky),
            "distillery" => json!(self.distillery),
            "tags" => json!(self.tags),
            _ => return None,
        };
        Some(value)
    }

    // author and tags are exact-match filters, so they are keywords
    fn mappings() -> Value {
        json!({
            "properties": {
                "nose": { "type": "text" },
                "palate": { "type": "text" },
                "finish": { "type": "text" },
                "score": { "type": "integer" },
                "timestamp": { "type": "date" },
                "author": { "type": "keyword" },
                "whisky": { "type": "text" },
                "distillery": { "type": "text" },
                "tags": { "type": "keyword" }
            }
        })
    }

    fn fetch(conn: &Connection, ids: &[i64]) -> Result<Vec<Self>> {
        queries::reviews_by_ids(conn, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn review() -> Review {
        Review {
            id: 7,
            nose: "Smoke".to_string(),
            palate: "Brine".to_string(),
            finish: "Long".to_string(),
            score: 91,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            author_id: 1,
            author: "john".to_string(),
            whisky_id: 3,
            whisky: "16".to_string(),
            distillery: "Lagavulin".to_string(),
            tags: vec!["Peat".to_string(), "Sweet".to_string()],
        }
    }

    #[test]
    fn test_document_has_exactly_searchable_fields() {
        let doc = review().to_document();
        let obj = doc.as_object().unwrap();

        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        let mut expected = REVIEW_FIELDS.to_vec();
        expected.sort_unstable();
        assert_eq!(keys, expected);

        assert_eq!(doc["score"], 91);
        assert_eq!(doc["author"], "john");
        assert_eq!(doc["tags"], json!(["Peat", "Sweet"]));
        assert_eq!(doc["timestamp"], "2024-03-01T12:00:00.000000Z");
    }

    #[test]
    fn test_unknown_field() {
        assert!(review().field_value("author_id").is_none());
    }

    #[test]
    fn test_mappings_cover_fields() {
        let mappings = Review::mappings();
        for field in Review::searchable_fields() {
            assert!(mappings["properties"].get(field).is_some(), "{}", field);
        }
    }
}
