//! Keeps the index in step with committed writes

use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::Value;
use std::marker::PhantomData;

use crate::error::Result;
use crate::search::client::IndexClient;
use crate::search::document::Searchable;
use crate::state::{AfterCommit, ChangeSet, CommitHook};

/// Commit hook mirroring one [`Searchable`] type into its index.
///
/// Documents are built inside the transaction, so they carry exactly the
/// committed values, and are sent only once the commit has succeeded.
/// Index failures are logged and never undo the write.
pub struct IndexSync<T> {
    client: IndexClient,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Searchable> IndexSync<T> {
    pub fn new(client: IndexClient) -> Self {
        Self {
            client,
            _entity: PhantomData,
        }
    }

    fn capture(&self, conn: &Connection, changes: &ChangeSet) -> Result<PendingSync> {
        let mut upserts = changes.inserted(T::ENTITY);
        upserts.extend(changes.updated(T::ENTITY));

        let documents = T::fetch(conn, &upserts)?
            .into_iter()
            .map(|entity| (entity.id(), entity.to_document()))
            .collect();

        Ok(PendingSync {
            client: self.client.clone(),
            index: T::INDEX,
            upserts: documents,
            removals: changes.deleted(T::ENTITY),
        })
    }
}

impl<T: Searchable> CommitHook for IndexSync<T> {
    fn before_commit(
        &self,
        conn: &Connection,
        changes: &ChangeSet,
    ) -> Result<Option<Box<dyn AfterCommit>>> {
        if !self.client.is_enabled() || !changes.touches(T::ENTITY) {
            return Ok(None);
        }

        match self.capture(conn, changes) {
            Ok(pending) if pending.is_empty() => Ok(None),
            Ok(pending) => Ok(Some(Box::new(pending))),
            Err(e) => {
                tracing::warn!(index = T::INDEX, error = %e, "Could not load documents for indexing");
                Ok(None)
            }
        }
    }
}

/// Index writes captured before commit
struct PendingSync {
    client: IndexClient,
    index: &'static str,
    upserts: Vec<(i64, Value)>,
    removals: Vec<i64>,
}

impl PendingSync {
    fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

#[async_trait]
impl AfterCommit for PendingSync {
    async fn run(self: Box<Self>) {
        for (id, document) in &self.upserts {
            if let Err(e) = self.client.add_to_index(self.index, *id, document).await {
                tracing::warn!(index = self.index, id, error = %e, "Failed to index document");
            }
        }

        for id in &self.removals {
            if let Err(e) = self.client.remove_from_index(self.index, *id).await {
                tracing::warn!(index = self.index, id, error = %e, "Failed to remove document");
            }
        }

        tracing::debug!(
            index = self.index,
            upserted = self.upserts.len(),
            removed = self.removals.len(),
            "Index synchronized"
        );
    }
}
