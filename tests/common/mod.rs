//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use whisky_catalog::models::{DistilleryInput, RegisterUser, ReviewInput, WhiskyInput};
use whisky_catalog::search::{SearchBackend, SearchHits, SearchResult};
use whisky_catalog::state::Database;

pub const PASSWORD: &str = "correct horse battery";

/// One index call seen by [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum IndexCall {
    Ensure(String),
    Index(String, i64, Value),
    Delete(String, i64),
    Search(String, Value),
}

/// In-process index that records calls and answers searches with canned hits
#[derive(Default)]
pub struct RecordingBackend {
    pub calls: Mutex<Vec<IndexCall>>,
    pub hits: Mutex<SearchHits>,
}

impl RecordingBackend {
    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().clone()
    }

    pub fn answer_with(&self, ids: Vec<i64>) {
        let total = ids.len() as u64;
        *self.hits.lock() = SearchHits { ids, total };
    }
}

#[async_trait]
impl SearchBackend for RecordingBackend {
    async fn ensure_index(&self, index: &str, _mappings: &Value) -> SearchResult<()> {
        self.calls.lock().push(IndexCall::Ensure(index.to_string()));
        Ok(())
    }

    async fn index_document(&self, index: &str, id: i64, document: &Value) -> SearchResult<()> {
        self.calls
            .lock()
            .push(IndexCall::Index(index.to_string(), id, document.clone()));
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: i64) -> SearchResult<()> {
        self.calls
            .lock()
            .push(IndexCall::Delete(index.to_string(), id));
        Ok(())
    }

    async fn search(&self, index: &str, body: &Value) -> SearchResult<SearchHits> {
        self.calls
            .lock()
            .push(IndexCall::Search(index.to_string(), body.clone()));
        Ok(self.hits.lock().clone())
    }
}

/// Ids created by [`seed`]
#[derive(Debug, Clone, Copy)]
pub struct Seed {
    pub user_id: i64,
    pub distillery_id: i64,
    pub whisky_id: i64,
}

/// One user ("john"), one distillery and one whisky
pub async fn seed(db: &Database) -> Seed {
    db.write(|w| {
        let user = w.create_user(&RegisterUser {
            username: "john".to_string(),
            email: "john@example.com".to_string(),
            password: PASSWORD.to_string(),
        })?;
        let distillery = w.add_distillery(&DistilleryInput {
            name: "lagavulin".to_string(),
            location: Some("Islay".to_string()),
            owner: Some("Diageo".to_string()),
            founded: 1816,
        })?;
        let whisky = w.add_whisky(
            distillery.id,
            &WhiskyInput {
                name: "16".to_string(),
                about: Some("Classic Islay".to_string()),
            },
        )?;
        Ok(Seed {
            user_id: user.id,
            distillery_id: distillery.id,
            whisky_id: whisky.id,
        })
    })
    .await
    .expect("seed data")
}

pub fn review_input(nose: &str, score: i64, tags: &[&str]) -> ReviewInput {
    ReviewInput {
        nose: nose.to_string(),
        palate: "Brine and iodine".to_string(),
        finish: "Long".to_string(),
        score,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}
