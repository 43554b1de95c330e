use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{Distillery, Page, Pagination, Review, User, Whisky};
use crate::state::changes::{AfterCommit, CommitHook};
use crate::state::queries;
use crate::state::writer::Writer;

/// Handle to the relational store.
///
/// Cheap to clone; all clones share one SQLite connection behind a mutex.
/// Writes go through [`Database::write`], which runs the registered
/// [`CommitHook`]s around the commit.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    hooks: Vec<Arc<dyn CommitHook>>,
}

impl Database {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        tracing::info!(path = ?path, "Opened SQLite database");
        Self::from_connection(conn)
    }

    /// Private in-memory database, used by tests and `:memory:` configs
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(queries::SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            hooks: Vec::new(),
        })
    }

    /// Register a hook run around every committing write
    pub fn with_hook(mut self, hook: Arc<dyn CommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Run read-only queries against the shared connection
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` in a transaction.
    ///
    /// If `f` fails the transaction rolls back and no hook work runs.
    /// Otherwise every hook's `before_commit` sees the final rows inside the
    /// transaction, the transaction commits, and the captured after-commit
    /// work runs in registration order. After-commit work cannot fail the
    /// write.
    pub async fn write<T, F>(&self, f: F) -> Result<T>
    where
        T: Send,
        F: FnOnce(&mut Writer<'_>) -> Result<T> + Send,
    {
        let (value, deferred) = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;

            let (value, changes) = {
                let mut writer = Writer::new(&tx);
                let value = f(&mut writer)?;
                (value, writer.into_changes())
            };

            let mut deferred: Vec<Box<dyn AfterCommit>> = Vec::new();
            for hook in &self.hooks {
                if let Some(after) = hook.before_commit(&tx, &changes)? {
                    deferred.push(after);
                }
            }

            tx.commit()?;
            tracing::trace!(changes = changes.len(), "Transaction committed");
            (value, deferred)
        };

        for after in deferred {
            after.run().await;
        }

        Ok(value)
    }

    // Users

    pub fn user(&self, id: i64) -> Result<Option<User>> {
        self.read(|conn| queries::user(conn, id))
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.read(|conn| queries::user_by_username(conn, username))
    }

    /// Look up a user and verify the password.
    ///
    /// The Argon2 check runs on the blocking pool.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let invalid = || AppError::Authentication("Invalid username or password".to_string());

        let user = self.user_by_username(username)?.ok_or_else(invalid)?;
        let password = password.to_string();

        let (user, verified) = tokio::task::spawn_blocking(move || {
            let verified = user.check_password(&password);
            (user, verified)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Password check failed: {}", e)))?;

        if verified {
            Ok(user)
        } else {
            Err(invalid())
        }
    }

    pub fn tried_whiskies(&self, user_id: i64) -> Result<Vec<Whisky>> {
        self.read(|conn| queries::tried_whiskies(conn, user_id))
    }

    pub fn has_whisky(&self, user_id: i64, whisky_id: i64) -> Result<bool> {
        self.read(|conn| {
            queries::exists(
                conn,
                "SELECT COUNT(*) FROM whiskies_tried WHERE user_id = ?1 AND whisky_id = ?2",
                user_id,
                whisky_id,
            )
        })
    }

    /// Whether the user already reviewed this whisky
    pub fn has_reviewed(&self, user_id: i64, whisky_id: i64) -> Result<bool> {
        self.read(|conn| {
            queries::exists(
                conn,
                "SELECT COUNT(*) FROM reviews WHERE user_id = ?1 AND whisky_id = ?2",
                user_id,
                whisky_id,
            )
        })
    }

    pub fn review_count_by(&self, user_id: i64) -> Result<u64> {
        self.read(|conn| queries::count(conn, "SELECT COUNT(*) FROM reviews WHERE user_id = ?1", user_id))
    }

    // Catalogue

    /// All distilleries, by name
    pub fn distilleries(&self) -> Result<Vec<Distillery>> {
        self.read(queries::distilleries)
    }

    pub fn distillery(&self, id: i64) -> Result<Option<Distillery>> {
        self.read(|conn| queries::distillery(conn, id))
    }

    pub fn whiskies_of(&self, distillery_id: i64) -> Result<Vec<Whisky>> {
        self.read(|conn| queries::whiskies_of(conn, distillery_id))
    }

    pub fn whisky_count(&self, distillery_id: i64) -> Result<u64> {
        self.read(|conn| {
            queries::count(
                conn,
                "SELECT COUNT(*) FROM whiskies WHERE distillery_id = ?1",
                distillery_id,
            )
        })
    }

    pub fn whisky(&self, id: i64) -> Result<Option<Whisky>> {
        self.read(|conn| queries::whisky(conn, id))
    }

    pub fn number_reviews(&self, whisky_id: i64) -> Result<u64> {
        self.read(|conn| {
            queries::count(conn, "SELECT COUNT(*) FROM reviews WHERE whisky_id = ?1", whisky_id)
        })
    }

    // Reviews

    pub fn review(&self, id: i64) -> Result<Option<Review>> {
        self.read(|conn| queries::review(conn, id))
    }

    /// Newest reviews first, across the catalogue or for one whisky
    pub fn recent_reviews(
        &self,
        whisky_id: Option<i64>,
        pagination: Pagination,
    ) -> Result<Page<Review>> {
        let (items, total) =
            self.read(|conn| queries::recent_reviews(conn, whisky_id, pagination))?;
        Ok(Page::new(items, total, pagination))
    }

    pub fn is_tagged(&self, review_id: i64, tag: &str) -> Result<bool> {
        self.read(|conn| match queries::tag_by_name(conn, &crate::models::title_case(tag))? {
            Some(tag) => queries::is_tagged(conn, review_id, tag.id),
            None => Ok(false),
        })
    }

    /// Every review, by id; used to rebuild the search index
    pub fn all_reviews(&self) -> Result<Vec<Review>> {
        self.read(|conn| queries::select_reviews(conn, "ORDER BY r.id ASC", &[]))
    }
}
