//! Row-level SQL shared by the read path, the [`Writer`](super::Writer) and
//! the search layer. Everything here takes a plain `&Connection` so it works
//! both inside and outside a transaction.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::models::{Distillery, Pagination, Review, Tag, User, Whisky};

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    about_me TEXT
);

CREATE TABLE IF NOT EXISTS distilleries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    location TEXT,
    owner TEXT,
    founded INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_distilleries_location ON distilleries(location);

CREATE TABLE IF NOT EXISTS whiskies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    about TEXT,
    distillery_id INTEGER NOT NULL REFERENCES distilleries(id),
    UNIQUE (distillery_id, name)
);

CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nose TEXT NOT NULL,
    palate TEXT NOT NULL,
    finish TEXT NOT NULL,
    score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
    timestamp TEXT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id),
    whisky_id INTEGER NOT NULL REFERENCES whiskies(id)
);

CREATE INDEX IF NOT EXISTS idx_reviews_timestamp ON reviews(timestamp);
CREATE INDEX IF NOT EXISTS idx_reviews_whisky ON reviews(whisky_id);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS review_tags (
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    review_id INTEGER NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
    PRIMARY KEY (tag_id, review_id)
);

CREATE TABLE IF NOT EXISTS whiskies_tried (
    whisky_id INTEGER NOT NULL REFERENCES whiskies(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    PRIMARY KEY (whisky_id, user_id)
);
"#;

/// Column list for [`review_from_row`]; tag names are folded into one
/// column separated by the ASCII unit separator.
pub(crate) const REVIEW_SELECT: &str = r#"
SELECT r.id, r.nose, r.palate, r.finish, r.score, r.timestamp,
       r.user_id, u.username, r.whisky_id, w.name, d.name,
       (SELECT GROUP_CONCAT(t.name, char(31))
          FROM review_tags rt JOIN tags t ON t.id = rt.tag_id
         WHERE rt.review_id = r.id) AS tag_names
  FROM reviews r
  JOIN users u ON u.id = r.user_id
  JOIN whiskies w ON w.id = r.whisky_id
  JOIN distilleries d ON d.id = w.distillery_id
"#;

const WHISKY_SELECT: &str = r#"
SELECT w.id, w.name, w.about, w.distillery_id, d.name
  FROM whiskies w
  JOIN distilleries d ON d.id = w.distillery_id
"#;

const TAG_SEPARATOR: char = '\u{1f}';

/// Fixed-width RFC 3339 so that text ordering equals time ordering
pub(crate) fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    let raw_timestamp: String = row.get(5)?;
    let tag_names: Option<String> = row.get(11)?;

    let mut tags: Vec<String> = tag_names
        .map(|joined| {
            joined
                .split(TAG_SEPARATOR)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    tags.sort();

    Ok(Review {
        id: row.get(0)?,
        nose: row.get(1)?,
        palate: row.get(2)?,
        finish: row.get(3)?,
        score: row.get(4)?,
        timestamp: decode_timestamp(5, &raw_timestamp)?,
        author_id: row.get(6)?,
        author: row.get(7)?,
        whisky_id: row.get(8)?,
        whisky: row.get(9)?,
        distillery: row.get(10)?,
        tags,
    })
}

/// Run `REVIEW_SELECT` with a trailing clause (WHERE / ORDER BY / LIMIT)
pub(crate) fn select_reviews(
    conn: &Connection,
    tail: &str,
    values: &[Value],
) -> Result<Vec<Review>> {
    let sql = format!("{REVIEW_SELECT} {tail}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), review_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Ids per `IN (...)` lookup, well below SQLite's bound-parameter limit
pub(crate) const ID_CHUNK: usize = 500;

/// Load reviews by id; order is unspecified
pub(crate) fn reviews_by_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<Review>> {
    let mut reviews = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(ID_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let values: Vec<Value> = chunk.iter().map(|id| Value::Integer(*id)).collect();
        reviews.extend(select_reviews(
            conn,
            &format!("WHERE r.id IN ({placeholders})"),
            &values,
        )?);
    }
    Ok(reviews)
}

pub(crate) fn review(conn: &Connection, id: i64) -> Result<Option<Review>> {
    Ok(select_reviews(conn, "WHERE r.id = ?1", &[Value::Integer(id)])?
        .into_iter()
        .next())
}

/// Newest first, optionally restricted to one whisky
pub(crate) fn recent_reviews(
    conn: &Connection,
    whisky_id: Option<i64>,
    pagination: Pagination,
) -> Result<(Vec<Review>, u64)> {
    let limit = Value::Integer(pagination.limit() as i64);
    let offset = Value::Integer(pagination.offset() as i64);

    let (items, total) = match whisky_id {
        Some(whisky_id) => {
            let items = select_reviews(
                conn,
                "WHERE r.whisky_id = ?1 ORDER BY r.timestamp DESC, r.id DESC LIMIT ?2 OFFSET ?3",
                &[Value::Integer(whisky_id), limit, offset],
            )?;
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM reviews WHERE whisky_id = ?1",
                params![whisky_id],
                |row| row.get(0),
            )?;
            (items, total)
        }
        None => {
            let items = select_reviews(
                conn,
                "ORDER BY r.timestamp DESC, r.id DESC LIMIT ?1 OFFSET ?2",
                &[limit, offset],
            )?;
            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))?;
            (items, total)
        }
    };

    Ok((items, total as u64))
}

pub(crate) fn review_ids_where(conn: &Connection, sql: &str, id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![id], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<i64>>>()?)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        about_me: row.get(4)?,
    })
}

pub(crate) fn user(conn: &Connection, id: i64) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            "SELECT id, username, email, password_hash, about_me FROM users WHERE id = ?1",
            params![id],
            user_from_row,
        )
        .optional()?)
}

pub(crate) fn user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            "SELECT id, username, email, password_hash, about_me FROM users WHERE username = ?1",
            params![username],
            user_from_row,
        )
        .optional()?)
}

fn distillery_from_row(row: &Row<'_>) -> rusqlite::Result<Distillery> {
    Ok(Distillery {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        owner: row.get(3)?,
        founded: row.get(4)?,
    })
}

pub(crate) fn distillery(conn: &Connection, id: i64) -> Result<Option<Distillery>> {
    Ok(conn
        .query_row(
            "SELECT id, name, location, owner, founded FROM distilleries WHERE id = ?1",
            params![id],
            distillery_from_row,
        )
        .optional()?)
}

pub(crate) fn distilleries(conn: &Connection) -> Result<Vec<Distillery>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, location, owner, founded FROM distilleries ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([], distillery_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn whisky_from_row(row: &Row<'_>) -> rusqlite::Result<Whisky> {
    Ok(Whisky {
        id: row.get(0)?,
        name: row.get(1)?,
        about: row.get(2)?,
        distillery_id: row.get(3)?,
        distillery: row.get(4)?,
    })
}

pub(crate) fn whisky(conn: &Connection, id: i64) -> Result<Option<Whisky>> {
    Ok(conn
        .query_row(
            &format!("{WHISKY_SELECT} WHERE w.id = ?1"),
            params![id],
            whisky_from_row,
        )
        .optional()?)
}

pub(crate) fn whiskies_of(conn: &Connection, distillery_id: i64) -> Result<Vec<Whisky>> {
    let mut stmt = conn.prepare(&format!(
        "{WHISKY_SELECT} WHERE w.distillery_id = ?1 ORDER BY w.name ASC"
    ))?;
    let rows = stmt.query_map(params![distillery_id], whisky_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(crate) fn tried_whiskies(conn: &Connection, user_id: i64) -> Result<Vec<Whisky>> {
    let mut stmt = conn.prepare(&format!(
        "{WHISKY_SELECT} JOIN whiskies_tried wt ON wt.whisky_id = w.id \
         WHERE wt.user_id = ?1 ORDER BY d.name ASC, w.name ASC"
    ))?;
    let rows = stmt.query_map(params![user_id], whisky_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(crate) fn count(conn: &Connection, sql: &str, id: i64) -> Result<u64> {
    let n: i64 = conn.query_row(sql, params![id], |row| row.get(0))?;
    Ok(n as u64)
}

pub(crate) fn exists(conn: &Connection, sql: &str, a: i64, b: i64) -> Result<bool> {
    let n: i64 = conn.query_row(sql, params![a, b], |row| row.get(0))?;
    Ok(n > 0)
}

pub(crate) fn tag_by_name(conn: &Connection, name: &str) -> Result<Option<Tag>> {
    Ok(conn
        .query_row(
            "SELECT id, name FROM tags WHERE name = ?1",
            params![name],
            |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?)
}

pub(crate) fn is_tagged(conn: &Connection, review_id: i64, tag_id: i64) -> Result<bool> {
    exists(
        conn,
        "SELECT COUNT(*) FROM review_tags WHERE review_id = ?1 AND tag_id = ?2",
        review_id,
        tag_id,
    )
}
