//! Relational store for users, the catalogue and reviews.
//!
//! Writes run through [`Database::write`], which hands a [`Writer`] to the
//! caller, records what changed, and runs [`CommitHook`]s around the commit.

pub mod changes;
pub(crate) mod queries;
pub mod store;
pub mod writer;

pub use changes::{AfterCommit, ChangeKind, ChangeSet, CommitHook, EntityKind};
pub use store::Database;
pub use writer::Writer;
