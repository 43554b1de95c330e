//! Change tracking for a single write transaction.
//!
//! Every mutation made through a [`Writer`](super::Writer) is recorded here
//! against the entity it touched. Commit hooks read the merged result to
//! learn which rows were inserted, updated or deleted.

use async_trait::async_trait;
use rusqlite::Connection;
use std::fmt;

use crate::error::Result;

/// Entity types tracked by the unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Distillery,
    Whisky,
    Review,
    Tag,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::User => "user",
            EntityKind::Distillery => "distillery",
            EntityKind::Whisky => "whisky",
            EntityKind::Review => "review",
            EntityKind::Tag => "tag",
        };
        f.write_str(name)
    }
}

/// What happened to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Merged set of changes made inside one transaction.
///
/// The three views (`inserted`, `updated`, `deleted`) are disjoint:
/// a row inserted then updated counts as inserted, a row inserted then
/// deleted disappears, and a row updated then deleted counts as deleted.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    entries: Vec<(EntityKind, i64, ChangeKind)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change, merging with any earlier change to the same row
    pub fn record(&mut self, entity: EntityKind, id: i64, kind: ChangeKind) {
        let existing = self
            .entries
            .iter()
            .position(|(e, i, _)| *e == entity && *i == id);

        let Some(pos) = existing else {
            self.entries.push((entity, id, kind));
            return;
        };

        let merged = match (self.entries[pos].2, kind) {
            (ChangeKind::Insert, ChangeKind::Delete) => None,
            (ChangeKind::Insert, _) => Some(ChangeKind::Insert),
            (ChangeKind::Delete, _) => Some(ChangeKind::Delete),
            (ChangeKind::Update, next) => Some(next),
        };

        match merged {
            Some(kind) => self.entries[pos].2 = kind,
            None => {
                self.entries.remove(pos);
            }
        }
    }

    /// Ids of `entity` rows with the given change kind, in first-touched order
    pub fn ids(&self, entity: EntityKind, kind: ChangeKind) -> Vec<i64> {
        self.entries
            .iter()
            .filter(|(e, _, k)| *e == entity && *k == kind)
            .map(|(_, id, _)| *id)
            .collect()
    }

    pub fn inserted(&self, entity: EntityKind) -> Vec<i64> {
        self.ids(entity, ChangeKind::Insert)
    }

    pub fn updated(&self, entity: EntityKind) -> Vec<i64> {
        self.ids(entity, ChangeKind::Update)
    }

    pub fn deleted(&self, entity: EntityKind) -> Vec<i64> {
        self.ids(entity, ChangeKind::Delete)
    }

    pub fn touches(&self, entity: EntityKind) -> bool {
        self.entries.iter().any(|(e, _, _)| *e == entity)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Work captured before commit and run once the commit is durable
#[async_trait]
pub trait AfterCommit: Send {
    async fn run(self: Box<Self>);
}

/// Observer of transaction commit boundaries.
///
/// `before_commit` runs inside the still-open transaction and sees the rows
/// exactly as they are about to be committed. Whatever it returns is run
/// after the commit succeeds; nothing runs when the transaction rolls back.
pub trait CommitHook: Send + Sync {
    fn before_commit(
        &self,
        conn: &Connection,
        changes: &ChangeSet,
    ) -> Result<Option<Box<dyn AfterCommit>>>;
}
