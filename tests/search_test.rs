//! Search against a fake Elasticsearch served by mockito

mod common;

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use common::{review_input, seed};
use whisky_catalog::config::Config;
use whisky_catalog::connect;
use whisky_catalog::error::AppError;
use whisky_catalog::models::Pagination;
use whisky_catalog::search::{AdvancedQuery, SearchService, SortOrder};
use whisky_catalog::state::Database;

fn config_for(server: &ServerGuard, prefix: &str) -> Config {
    let mut config = Config::default();
    config.database.path = ":memory:".into();
    config.search.elasticsearch_url = Some(server.url());
    config.search.index_prefix = prefix.to_string();
    config
}

async fn setup(server: &ServerGuard) -> (Database, SearchService) {
    connect(&config_for(server, "")).unwrap()
}

fn search_response(ids: &[i64], total: u64) -> String {
    let hits: Vec<_> = ids
        .iter()
        .map(|id| json!({ "_index": "reviews", "_id": id.to_string(), "_score": 1.0 }))
        .collect();
    json!({
        "took": 1,
        "timed_out": false,
        "hits": { "total": { "value": total, "relation": "eq" }, "hits": hits }
    })
    .to_string()
}

#[tokio::test]
async fn test_ensure_index_sends_mappings() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/reviews")
        .match_body(Matcher::PartialJson(json!({
            "mappings": { "properties": { "author": { "type": "keyword" }, "tags": { "type": "keyword" } } }
        })))
        .with_status(200)
        .with_body(r#"{"acknowledged":true}"#)
        .create_async()
        .await;

    let (_db, search) = setup(&server).await;
    search.ensure_index().await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ensure_index_tolerates_existing_index() {
    let mut server = Server::new_async().await;
    server
        .mock("PUT", "/reviews")
        .with_status(400)
        .with_body(r#"{"error":{"type":"resource_already_exists_exception"},"status":400}"#)
        .create_async()
        .await;

    let (_db, search) = setup(&server).await;
    assert!(search.ensure_index().await.is_ok());
}

#[tokio::test]
async fn test_new_review_is_upserted_with_searchable_fields() {
    let mut server = Server::new_async().await;
    let (db, _search) = setup(&server).await;
    let seed = seed(&db).await;

    let mock = server
        .mock("PUT", "/reviews/_doc/1")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({
                "nose": "Peat smoke",
                "palate": "Brine and iodine",
                "finish": "Long",
                "score": 92,
                "author": "john",
                "whisky": "16",
                "distillery": "Lagavulin",
                "tags": ["Peat", "Smoky"]
            })),
            Matcher::Regex(r#""timestamp":"\d{4}-\d{2}-\d{2}T"#.to_string()),
        ]))
        .with_status(201)
        .with_body(r#"{"result":"created"}"#)
        .expect(1)
        .create_async()
        .await;

    let id = db
        .write(move |w| {
            w.create_review(seed.user_id, seed.whisky_id, &review_input("Peat smoke", 92, &["smoky", "peat"]))
        })
        .await
        .unwrap();

    assert_eq!(id, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_deleted_review_is_removed() {
    let mut server = Server::new_async().await;
    let (db, _search) = setup(&server).await;
    let seed = seed(&db).await;

    server
        .mock("PUT", Matcher::Regex(r"^/reviews/_doc/\d+$".to_string()))
        .with_status(201)
        .create_async()
        .await;
    // already gone from the index: still fine
    let delete = server
        .mock("DELETE", "/reviews/_doc/1")
        .with_status(404)
        .with_body(r#"{"result":"not_found"}"#)
        .expect(1)
        .create_async()
        .await;

    let id = db
        .write(move |w| w.create_review(seed.user_id, seed.whisky_id, &review_input("Smoke", 80, &[])))
        .await
        .unwrap();
    db.write(move |w| w.delete_review(id)).await.unwrap();

    delete.assert_async().await;
    assert!(db.review(id).unwrap().is_none());
}

#[tokio::test]
async fn test_rolled_back_write_makes_no_index_calls() {
    let mut server = Server::new_async().await;
    let (db, _search) = setup(&server).await;
    let seed = seed(&db).await;

    let mock = server
        .mock("PUT", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let result: whisky_catalog::error::Result<()> = db
        .write(move |w| {
            w.create_review(seed.user_id, seed.whisky_id, &review_input("Smoke", 80, &[]))?;
            Err(AppError::Validation("rejected".to_string()))
        })
        .await;

    assert!(result.is_err());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_index_outage_does_not_fail_writes() {
    let mut server = Server::new_async().await;
    let (db, _search) = setup(&server).await;
    let seed = seed(&db).await;

    server
        .mock("PUT", Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let id = db
        .write(move |w| w.create_review(seed.user_id, seed.whisky_id, &review_input("Smoke", 80, &[])))
        .await
        .unwrap();
    assert!(db.review(id).unwrap().is_some());
}

#[tokio::test]
async fn test_simple_search_returns_reviews_in_hit_order() {
    let mut server = Server::new_async().await;
    let (db, search) = setup(&server).await;
    let seed = seed(&db).await;

    server
        .mock("PUT", Matcher::Regex(r"^/reviews/_doc/\d+$".to_string()))
        .with_status(201)
        .create_async()
        .await;
    for nose in ["one", "two", "three"] {
        db.write(move |w| w.create_review(seed.user_id, seed.whisky_id, &review_input(nose, 85, &[])))
            .await
            .unwrap();
    }

    let mock = server
        .mock("POST", "/reviews/_search")
        .match_body(Matcher::PartialJson(json!({
            "from": 10,
            "size": 10,
            "sort": [{ "timestamp": { "order": "desc" } }],
            "query": { "bool": {
                "must": { "multi_match": { "query": "smoke", "fields": ["*"] } },
                "must_not": { "multi_match": { "query": "cheap" } },
                "filter": [{ "term": { "tags": "Peat" } }]
            } }
        })))
        .with_status(200)
        .with_body(search_response(&[3, 1, 2], 23))
        .create_async()
        .await;

    let page = search
        .simple_search("smoke @peat -cheap", Pagination::new(2, 10), SortOrder::New, None)
        .await
        .unwrap();

    mock.assert_async().await;
    let ids: Vec<i64> = page.items.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![3, 1, 2]);
    assert_eq!(page.total, 23);
    assert!(page.has_prev);
    assert!(page.has_next);
}

#[tokio::test]
async fn test_zero_hits_is_an_empty_page() {
    let mut server = Server::new_async().await;
    let (_db, search) = setup(&server).await;

    server
        .mock("POST", "/reviews/_search")
        .with_status(200)
        .with_body(search_response(&[], 0))
        .create_async()
        .await;

    let page = search
        .simple_search("nothing", Pagination::new(1, 10), SortOrder::Relevance, Some("Peat"))
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn test_advanced_search_defaults_upper_score() {
    let mut server = Server::new_async().await;
    let (_db, search) = setup(&server).await;

    let mock = server
        .mock("POST", "/reviews/_search")
        .match_body(Matcher::PartialJson(json!({
            "query": { "bool": {
                "filter": [{ "range": { "score": { "gte": 80, "lte": 100 } } }],
                "minimum_should_match": 1
            } }
        })))
        .with_status(200)
        .with_body(search_response(&[], 0))
        .create_async()
        .await;

    let query = AdvancedQuery::default()
        .with_scores(Some(80), None)
        .with_tags("peat");
    search
        .advanced_search(&query, Pagination::new(1, 10), SortOrder::Relevance)
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_search_failure_is_a_network_error() {
    let mut server = Server::new_async().await;
    let (_db, search) = setup(&server).await;

    server
        .mock("POST", "/reviews/_search")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let err = search
        .simple_search("smoke", Pagination::new(1, 10), SortOrder::Relevance, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Network(_)));
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_reindex_pushes_every_review_under_prefix() {
    let mut server = Server::new_async().await;
    let (db, search) = connect(&config_for(&server, "prod-")).unwrap();
    let seed = seed(&db).await;

    server
        .mock("PUT", Matcher::Regex(r"^/prod-reviews/_doc/\d+$".to_string()))
        .with_status(201)
        .expect(2)
        .create_async()
        .await;
    for nose in ["one", "two"] {
        db.write(move |w| w.create_review(seed.user_id, seed.whisky_id, &review_input(nose, 70, &[])))
            .await
            .unwrap();
    }

    server
        .mock("PUT", "/prod-reviews")
        .with_status(200)
        .create_async()
        .await;
    let upserts = server
        .mock("PUT", Matcher::Regex(r"^/prod-reviews/_doc/\d+$".to_string()))
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    assert_eq!(search.reindex().await.unwrap(), 2);
    upserts.assert_async().await;
}
