use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::{AppError, Result};
use crate::models::{
    title_case, Distillery, DistilleryInput, EditProfile, RegisterUser, ReviewInput, User, Whisky,
    WhiskyInput,
};
use crate::state::changes::{ChangeKind, ChangeSet, EntityKind};
use crate::state::queries;

/// Mutations inside one open transaction.
///
/// Each method records what it touched in a [`ChangeSet`]; relationship
/// edits (tags, tried whiskies) mark the owning row as updated, and renames
/// mark every review that carries the old name as updated so their index
/// documents get refreshed.
pub struct Writer<'a> {
    conn: &'a Connection,
    changes: ChangeSet,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            changes: ChangeSet::new(),
        }
    }

    pub(crate) fn into_changes(self) -> ChangeSet {
        self.changes
    }

    fn record(&mut self, entity: EntityKind, id: i64, kind: ChangeKind) {
        self.changes.record(entity, id, kind);
    }

    fn touch_reviews(&mut self, sql: &str, id: i64) -> Result<()> {
        for review_id in queries::review_ids_where(self.conn, sql, id)? {
            self.record(EntityKind::Review, review_id, ChangeKind::Update);
        }
        Ok(())
    }

    // Users

    pub fn create_user(&mut self, input: &RegisterUser) -> Result<User> {
        let mut user = User {
            id: 0,
            username: input.username.trim().to_string(),
            email: input.email.trim().to_string(),
            password_hash: String::new(),
            about_me: None,
        };
        user.set_password(&input.password)?;

        self.conn.execute(
            "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
            params![user.username, user.email, user.password_hash],
        )?;
        user.id = self.conn.last_insert_rowid();
        self.record(EntityKind::User, user.id, ChangeKind::Insert);

        tracing::debug!(user_id = user.id, username = %user.username, "User created");
        Ok(user)
    }

    pub fn update_profile(&mut self, user_id: i64, input: &EditProfile) -> Result<User> {
        let current = queries::user(self.conn, user_id)?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        let username = input.username.trim();

        self.conn.execute(
            "UPDATE users SET username = ?1, about_me = ?2 WHERE id = ?3",
            params![username, input.about_me, user_id],
        )?;
        self.record(EntityKind::User, user_id, ChangeKind::Update);

        if current.username != username {
            self.touch_reviews("SELECT id FROM reviews WHERE user_id = ?1", user_id)?;
        }

        queries::user(self.conn, user_id)?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    /// Mark a whisky as tried; false when it already was
    pub fn add_whisky_tried(&mut self, user_id: i64, whisky_id: i64) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO whiskies_tried (whisky_id, user_id) VALUES (?1, ?2)",
            params![whisky_id, user_id],
        )?;
        if inserted > 0 {
            self.record(EntityKind::User, user_id, ChangeKind::Update);
        }
        Ok(inserted > 0)
    }

    /// Unmark a whisky; false when it was not marked
    pub fn remove_whisky_tried(&mut self, user_id: i64, whisky_id: i64) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM whiskies_tried WHERE whisky_id = ?1 AND user_id = ?2",
            params![whisky_id, user_id],
        )?;
        if deleted > 0 {
            self.record(EntityKind::User, user_id, ChangeKind::Update);
        }
        Ok(deleted > 0)
    }

    /// Flip the tried flag and return the new state
    pub fn toggle_whisky_tried(&mut self, user_id: i64, whisky_id: i64) -> Result<bool> {
        if self.remove_whisky_tried(user_id, whisky_id)? {
            Ok(false)
        } else {
            self.add_whisky_tried(user_id, whisky_id)
        }
    }

    // Catalogue

    pub fn add_distillery(&mut self, input: &DistilleryInput) -> Result<Distillery> {
        self.conn.execute(
            "INSERT INTO distilleries (name, location, owner, founded) VALUES (?1, ?2, ?3, ?4)",
            params![title_case(&input.name), input.location, input.owner, input.founded],
        )?;
        let id = self.conn.last_insert_rowid();
        self.record(EntityKind::Distillery, id, ChangeKind::Insert);

        queries::distillery(self.conn, id)?
            .ok_or_else(|| AppError::Internal(format!("Distillery {} vanished", id)))
    }

    pub fn update_distillery(&mut self, id: i64, input: &DistilleryInput) -> Result<Distillery> {
        let current = queries::distillery(self.conn, id)?
            .ok_or_else(|| AppError::NotFound(format!("Distillery {} not found", id)))?;
        let name = title_case(&input.name);

        self.conn.execute(
            "UPDATE distilleries SET name = ?1, location = ?2, owner = ?3, founded = ?4 WHERE id = ?5",
            params![name, input.location, input.owner, input.founded, id],
        )?;
        self.record(EntityKind::Distillery, id, ChangeKind::Update);

        if current.name != name {
            self.touch_reviews(
                "SELECT r.id FROM reviews r JOIN whiskies w ON w.id = r.whisky_id \
                 WHERE w.distillery_id = ?1",
                id,
            )?;
        }

        queries::distillery(self.conn, id)?
            .ok_or_else(|| AppError::NotFound(format!("Distillery {} not found", id)))
    }

    pub fn add_whisky(&mut self, distillery_id: i64, input: &WhiskyInput) -> Result<Whisky> {
        if queries::distillery(self.conn, distillery_id)?.is_none() {
            return Err(AppError::NotFound(format!(
                "Distillery {} not found",
                distillery_id
            )));
        }

        self.conn.execute(
            "INSERT INTO whiskies (name, about, distillery_id) VALUES (?1, ?2, ?3)",
            params![input.name.trim(), input.about, distillery_id],
        )?;
        let id = self.conn.last_insert_rowid();
        self.record(EntityKind::Whisky, id, ChangeKind::Insert);

        queries::whisky(self.conn, id)?
            .ok_or_else(|| AppError::Internal(format!("Whisky {} vanished", id)))
    }

    pub fn update_whisky(&mut self, id: i64, input: &WhiskyInput) -> Result<Whisky> {
        let current = queries::whisky(self.conn, id)?
            .ok_or_else(|| AppError::NotFound(format!("Whisky {} not found", id)))?;
        let name = input.name.trim();

        self.conn.execute(
            "UPDATE whiskies SET name = ?1, about = ?2 WHERE id = ?3",
            params![name, input.about, id],
        )?;
        self.record(EntityKind::Whisky, id, ChangeKind::Update);

        if current.name != name {
            self.touch_reviews("SELECT id FROM reviews WHERE whisky_id = ?1", id)?;
        }

        queries::whisky(self.conn, id)?
            .ok_or_else(|| AppError::NotFound(format!("Whisky {} not found", id)))
    }

    // Reviews

    pub fn create_review(
        &mut self,
        author_id: i64,
        whisky_id: i64,
        input: &ReviewInput,
    ) -> Result<i64> {
        if queries::whisky(self.conn, whisky_id)?.is_none() {
            return Err(AppError::NotFound(format!("Whisky {} not found", whisky_id)));
        }

        self.conn.execute(
            "INSERT INTO reviews (nose, palate, finish, score, timestamp, user_id, whisky_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                input.nose,
                input.palate,
                input.finish,
                input.score,
                queries::encode_timestamp(&Utc::now()),
                author_id,
                whisky_id
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.record(EntityKind::Review, id, ChangeKind::Insert);

        for tag in &input.tags {
            self.add_tag(id, tag)?;
        }

        tracing::debug!(review_id = id, whisky_id, author_id, "Review created");
        Ok(id)
    }

    /// Replace text, score and the full tag set
    pub fn update_review(&mut self, id: i64, input: &ReviewInput) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE reviews SET nose = ?1, palate = ?2, finish = ?3, score = ?4 WHERE id = ?5",
            params![input.nose, input.palate, input.finish, input.score, id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("Review {} not found", id)));
        }
        self.record(EntityKind::Review, id, ChangeKind::Update);
        self.set_tags(id, &input.tags)
    }

    pub fn delete_review(&mut self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM review_tags WHERE review_id = ?1", params![id])?;
        let deleted = self
            .conn
            .execute("DELETE FROM reviews WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!("Review {} not found", id)));
        }
        self.record(EntityKind::Review, id, ChangeKind::Delete);

        tracing::debug!(review_id = id, "Review deleted");
        Ok(())
    }

    /// Attach a tag, creating it on first use; false when already attached
    pub fn add_tag(&mut self, review_id: i64, name: &str) -> Result<bool> {
        let tag_id = self.tag_id(name)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO review_tags (tag_id, review_id) VALUES (?1, ?2)",
            params![tag_id, review_id],
        )?;
        if inserted > 0 {
            self.record(EntityKind::Review, review_id, ChangeKind::Update);
        }
        Ok(inserted > 0)
    }

    /// Detach a tag; false when it was not attached
    pub fn remove_tag(&mut self, review_id: i64, name: &str) -> Result<bool> {
        let Some(tag) = queries::tag_by_name(self.conn, &title_case(name))? else {
            return Ok(false);
        };
        let deleted = self.conn.execute(
            "DELETE FROM review_tags WHERE tag_id = ?1 AND review_id = ?2",
            params![tag.id, review_id],
        )?;
        if deleted > 0 {
            self.record(EntityKind::Review, review_id, ChangeKind::Update);
        }
        Ok(deleted > 0)
    }

    /// Make the review's tags exactly `names`
    pub fn set_tags(&mut self, review_id: i64, names: &[String]) -> Result<()> {
        let wanted: Vec<String> = names.iter().map(|n| title_case(n)).collect();
        let current = queries::review(self.conn, review_id)?
            .map(|review| review.tags)
            .unwrap_or_default();

        for name in current.iter().filter(|name| !wanted.contains(name)) {
            self.remove_tag(review_id, name)?;
        }
        for name in &wanted {
            self.add_tag(review_id, name)?;
        }
        Ok(())
    }

    fn tag_id(&mut self, name: &str) -> Result<i64> {
        let name = title_case(name);
        if name.is_empty() {
            return Err(AppError::Validation("Tag name must not be empty".to_string()));
        }
        if let Some(tag) = queries::tag_by_name(self.conn, &name)? {
            return Ok(tag.id);
        }

        self.conn
            .execute("INSERT INTO tags (name) VALUES (?1)", params![name])?;
        let id = self.conn.last_insert_rowid();
        self.record(EntityKind::Tag, id, ChangeKind::Insert);
        Ok(id)
    }
}
