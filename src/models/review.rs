use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A tasting review, loaded together with the names it refers to.
///
/// `author`, `whisky`, `distillery` and `tags` are joined from their own
/// tables; they are what the index document carries for filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub nose: String,
    pub palate: String,
    pub finish: String,

    /// 0..=100
    pub score: i64,

    pub timestamp: DateTime<Utc>,

    pub author_id: i64,
    pub author: String,

    pub whisky_id: i64,
    pub whisky: String,
    pub distillery: String,

    /// Tag names, sorted
    pub tags: Vec<String>,
}

/// Review body as submitted or edited by its author
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewInput {
    #[validate(length(min = 1, max = 255))]
    pub nose: String,

    #[validate(length(min = 1, max = 255))]
    pub palate: String,

    #[validate(length(min = 1, max = 255))]
    pub finish: String,

    #[validate(range(min = 0, max = 100, message = "Please give a score from 0 to 100"))]
    pub score: i64,

    /// Tag names; normalized to title case on write
    #[serde(default)]
    pub tags: Vec<String>,
}
