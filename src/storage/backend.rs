//! Snapshot store trait definition
//!
//! This module defines the core `SnapshotStore` trait that all
//! storage implementations must implement.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use super::error::StorageResult;
use super::record::RecordId;
use crate::Snapshot;

/// Trait for durable snapshot storage
///
/// ## Concurrency
///
/// One monitor loop may `save` while another loop (or a report generator) calls
/// `latest`/`list` at the same time. A record must never be visible to readers
/// before it is completely written.
///
/// ## Error Handling
///
/// `latest` skips records it cannot read and only fails with
/// [`StorageError::NotFound`](super::StorageError::NotFound) when nothing readable is left.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot as a new record
    ///
    /// Never overwrites an existing record, even if two snapshots fall into the same
    /// second.
    async fn save(&self, snapshot: &Snapshot) -> StorageResult<RecordId>;

    /// The most recent readable snapshot
    async fn latest(&self) -> StorageResult<Snapshot>;

    /// All record ids, oldest first
    ///
    /// Ids are collected eagerly since ordering needs every name anyway. The
    /// snapshots behind them are read lazily through [`history`].
    async fn list(&self) -> StorageResult<Vec<RecordId>>;

    /// Read a single record
    async fn load(&self, id: &RecordId) -> StorageResult<Snapshot>;
}

/// Every record in ascending order, loaded one at a time as the stream is polled.
pub async fn history<'a>(
    store: &'a dyn SnapshotStore,
) -> StorageResult<BoxStream<'a, (RecordId, StorageResult<Snapshot>)>> {
    let ids = store.list().await?;

    Ok(stream::iter(ids)
        .then(move |id| async move {
            let snapshot = store.load(&id).await;
            (id, snapshot)
        })
        .boxed())
}
