//! Search query parsing and Elasticsearch query DSL building

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use strum::{Display, EnumString};
use validator::{Validate, ValidationError};

use crate::models::{title_case, Pagination};

/// Boost applied to the whole advanced query
const ADVANCED_BOOST: f64 = 2.0;

/// Sort order for search results
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortOrder {
    /// By score, best first
    #[default]
    Relevance,
    /// Oldest first
    Old,
    /// Newest first
    New,
}

impl SortOrder {
    fn clause(self) -> Option<Value> {
        match self {
            SortOrder::Relevance => None,
            SortOrder::Old => Some(json!([{ "timestamp": { "order": "asc" } }])),
            SortOrder::New => Some(json!([{ "timestamp": { "order": "desc" } }])),
        }
    }
}

/// A free-text query split into its parts.
///
/// `@word` becomes a tag filter, `-word` goes into the exclusion phrase,
/// everything else into the inclusion phrase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleQuery {
    pub inclusion: String,
    pub exclusion: String,
    pub tags: Vec<String>,
}

impl SimpleQuery {
    pub fn parse(raw: &str) -> Self {
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        let mut tags = Vec::new();

        for token in raw.split_whitespace() {
            if let Some(tag) = token.strip_prefix('@') {
                if !tag.is_empty() {
                    tags.push(title_case(tag));
                }
            } else if let Some(word) = token.strip_prefix('-') {
                if !word.is_empty() {
                    excluded.push(word);
                }
            } else {
                included.push(token);
            }
        }

        Self {
            inclusion: included.join(" "),
            exclusion: excluded.join(" "),
            tags,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inclusion.is_empty() && self.exclusion.is_empty() && self.tags.is_empty()
    }

    /// Bool query: inclusion must match, exclusion must not, every tag filters
    pub fn to_query(&self) -> Value {
        let mut bool_query = Map::new();

        if !self.inclusion.is_empty() {
            bool_query.insert("must".to_string(), match_everywhere(&self.inclusion));
        }
        if !self.exclusion.is_empty() {
            bool_query.insert("must_not".to_string(), match_everywhere(&self.exclusion));
        }
        if !self.tags.is_empty() {
            let filters: Vec<Value> = self
                .tags
                .iter()
                .map(|tag| json!({ "term": { "tags": tag } }))
                .collect();
            bool_query.insert("filter".to_string(), Value::Array(filters));
        }

        json!({ "bool": bool_query })
    }
}

fn match_everywhere(phrase: &str) -> Value {
    json!({
        "multi_match": {
            "query": phrase,
            "fields": ["*"],
            "lenient": true
        }
    })
}

/// Structured search over reviews.
///
/// Review text and names contribute to relevance; the score range and
/// author are hard filters; tags only raise the score of matching reviews.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_score_bounds"))]
pub struct AdvancedQuery {
    /// Phrase matched against nose, palate and finish
    #[serde(default)]
    pub review: Option<String>,

    #[validate(range(min = 0, max = 100))]
    #[serde(default)]
    pub score_lower: Option<i64>,

    #[validate(range(min = 0, max = 100))]
    #[serde(default, alias = "score_greater")]
    pub score_upper: Option<i64>,

    /// Exact author username
    #[serde(default)]
    pub author: Option<String>,

    /// Fuzzy distillery or whisky name
    #[serde(default)]
    pub whisky: Option<String>,

    /// Whitespace or comma separated tag names
    #[serde(default)]
    pub tags: Option<String>,
}

fn validate_score_bounds(query: &AdvancedQuery) -> Result<(), ValidationError> {
    let (lower, upper) = query.score_range();
    if lower > upper {
        let mut err = ValidationError::new("score_range");
        err.message = Some("Lower score bound exceeds upper bound".into());
        return Err(err);
    }
    Ok(())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl AdvancedQuery {
    pub fn with_review(mut self, review: impl Into<String>) -> Self {
        self.review = Some(review.into());
        self
    }

    pub fn with_scores(mut self, lower: Option<i64>, upper: Option<i64>) -> Self {
        self.score_lower = lower;
        self.score_upper = upper;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_whisky(mut self, whisky: impl Into<String>) -> Self {
        self.whisky = Some(whisky.into());
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    /// Inclusive score bounds, defaulting to 0 and 100
    pub fn score_range(&self) -> (i64, i64) {
        (self.score_lower.unwrap_or(0), self.score_upper.unwrap_or(100))
    }

    /// Tag names, title-cased
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(title_case)
            .collect()
    }

    pub fn to_query(&self) -> Value {
        let mut must = Vec::new();
        let mut should = Vec::new();
        let (lower, upper) = self.score_range();
        let mut filter = vec![json!({ "range": { "score": { "gte": lower, "lte": upper } } })];

        if let Some(review) = non_blank(&self.review) {
            must.push(json!({
                "multi_match": {
                    "query": review,
                    "fields": ["nose", "palate", "finish"],
                    "type": "cross_fields"
                }
            }));
        }

        if let Some(author) = non_blank(&self.author) {
            filter.push(json!({ "term": { "author": author } }));
        }

        if let Some(name) = non_blank(&self.whisky) {
            should.push(json!({
                "multi_match": {
                    "query": name,
                    "fields": ["distillery", "whisky^0.5"],
                    "fuzziness": "AUTO"
                }
            }));
        }

        for tag in self.tag_list() {
            should.push(json!({ "term": { "tags": tag } }));
        }

        let mut bool_query = Map::new();
        if !must.is_empty() {
            bool_query.insert("must".to_string(), Value::Array(must));
        }
        bool_query.insert("filter".to_string(), Value::Array(filter));
        if !should.is_empty() {
            bool_query.insert("should".to_string(), Value::Array(should));
            bool_query.insert("minimum_should_match".to_string(), json!(1));
        }
        bool_query.insert("boost".to_string(), json!(ADVANCED_BOOST));

        json!({ "bool": bool_query })
    }
}

/// Assembles a `_search` request body
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: Value,
    pagination: Pagination,
    sort: SortOrder,
}

impl QueryBuilder {
    pub fn new(query: Value) -> Self {
        Self {
            query,
            pagination: Pagination::new(1, 10),
            sort: SortOrder::default(),
        }
    }

    pub fn simple(query: &SimpleQuery) -> Self {
        Self::new(query.to_query())
    }

    pub fn advanced(query: &AdvancedQuery) -> Self {
        Self::new(query.to_query())
    }

    pub fn with_page(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn build(&self) -> Value {
        let mut body = json!({
            "query": self.query,
            "from": self.pagination.offset(),
            "size": self.pagination.limit(),
        });
        if let Some(sort) = self.sort.clause() {
            body["sort"] = sort;
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_simple_query() {
        let query = SimpleQuery::parse("smoke @Peat -cheap");
        assert_eq!(query.inclusion, "smoke");
        assert_eq!(query.exclusion, "cheap");
        assert_eq!(query.tags, vec!["Peat".to_string()]);
    }

    #[test]
    fn test_parse_normalizes_tags_and_skips_bare_markers() {
        let query = SimpleQuery::parse("  @peat  sweet @ - @SHERRY-cask vanilla -young -harsh");
        assert_eq!(query.inclusion, "sweet vanilla");
        assert_eq!(query.exclusion, "young harsh");
        assert_eq!(query.tags, vec!["Peat".to_string(), "Sherry-Cask".to_string()]);
        assert!(SimpleQuery::parse("  ").is_empty());
    }

    #[test]
    fn test_simple_query_dsl() {
        let dsl = SimpleQuery::parse("smoke @Peat @Sweet -cheap").to_query();

        assert_eq!(dsl["bool"]["must"]["multi_match"]["query"], "smoke");
        assert_eq!(dsl["bool"]["must"]["multi_match"]["fields"], json!(["*"]));
        assert_eq!(dsl["bool"]["must_not"]["multi_match"]["query"], "cheap");
        assert_eq!(
            dsl["bool"]["filter"],
            json!([{ "term": { "tags": "Peat" } }, { "term": { "tags": "Sweet" } }])
        );
    }

    #[test]
    fn test_simple_query_omits_empty_clauses() {
        let dsl = SimpleQuery::parse("@Peat").to_query();
        assert!(dsl["bool"].get("must").is_none());
        assert!(dsl["bool"].get("must_not").is_none());
        assert!(dsl["bool"].get("filter").is_some());

        let dsl = SimpleQuery::parse("smoke").to_query();
        assert!(dsl["bool"].get("must_not").is_none());
        assert!(dsl["bool"].get("filter").is_none());
    }

    #[test]
    fn test_advanced_default_upper_bound() {
        let query = AdvancedQuery::default().with_scores(Some(80), None);
        assert_eq!(query.score_range(), (80, 100));

        let dsl = query.to_query();
        assert_eq!(
            dsl["bool"]["filter"][0],
            json!({ "range": { "score": { "gte": 80, "lte": 100 } } })
        );
    }

    #[test]
    fn test_advanced_query_dsl() {
        let dsl = AdvancedQuery::default()
            .with_review("smoky")
            .with_author("john")
            .with_whisky("lagavulin")
            .with_tags("peat, sweet")
            .to_query();
        let bool_query = &dsl["bool"];

        assert_eq!(bool_query["must"][0]["multi_match"]["type"], "cross_fields");
        assert_eq!(
            bool_query["must"][0]["multi_match"]["fields"],
            json!(["nose", "palate", "finish"])
        );
        assert_eq!(bool_query["filter"][1], json!({ "term": { "author": "john" } }));
        assert_eq!(
            bool_query["should"][0]["multi_match"]["fields"],
            json!(["distillery", "whisky^0.5"])
        );
        assert_eq!(bool_query["should"][0]["multi_match"]["fuzziness"], "AUTO");
        assert_eq!(bool_query["should"][1], json!({ "term": { "tags": "Peat" } }));
        assert_eq!(bool_query["should"][2], json!({ "term": { "tags": "Sweet" } }));
        assert_eq!(bool_query["minimum_should_match"], 1);
        assert_eq!(bool_query["boost"], ADVANCED_BOOST);
    }

    #[test]
    fn test_advanced_without_should_has_no_minimum() {
        let dsl = AdvancedQuery::default().with_review("smoky").to_query();
        assert!(dsl["bool"].get("should").is_none());
        assert!(dsl["bool"].get("minimum_should_match").is_none());
    }

    #[test]
    fn test_advanced_validation() {
        assert!(AdvancedQuery::default().validate().is_ok());
        assert!(AdvancedQuery::default()
            .with_scores(Some(90), Some(80))
            .validate()
            .is_err());
        assert!(AdvancedQuery::default()
            .with_scores(Some(-1), None)
            .validate()
            .is_err());
        assert!(AdvancedQuery::default()
            .with_scores(None, Some(101))
            .validate()
            .is_err());
    }

    #[test]
    fn test_score_greater_alias() {
        let query: AdvancedQuery =
            serde_json::from_value(json!({ "score_lower": 10, "score_greater": 20 })).unwrap();
        assert_eq!(query.score_range(), (10, 20));
    }

    #[test]
    fn test_body_pagination_and_sort() {
        let body = QueryBuilder::simple(&SimpleQuery::parse("smoke"))
            .with_page(Pagination::new(3, 10))
            .with_sort(SortOrder::New)
            .build();
        assert_eq!(body["from"], 20);
        assert_eq!(body["size"], 10);
        assert_eq!(body["sort"], json!([{ "timestamp": { "order": "desc" } }]));

        let body = QueryBuilder::simple(&SimpleQuery::parse("smoke"))
            .with_page(Pagination::new(0, 5))
            .build();
        assert_eq!(body["from"], 0);
        assert!(body.get("sort").is_none());
    }

    #[test]
    fn test_old_sort_is_ascending() {
        let body = QueryBuilder::simple(&SimpleQuery::parse("smoke"))
            .with_page(Pagination::new(1, 10))
            .with_sort(SortOrder::Old)
            .build();
        assert_eq!(body["sort"], json!([{ "timestamp": { "order": "asc" } }]));
    }

    #[test]
    fn test_sort_order_strings() {
        assert_eq!(SortOrder::from_str("new").unwrap(), SortOrder::New);
        assert_eq!(SortOrder::from_str("OLD").unwrap(), SortOrder::Old);
        assert_eq!(SortOrder::Relevance.to_string(), "relevance");
        assert!(SortOrder::from_str("sideways").is_err());
    }
}
