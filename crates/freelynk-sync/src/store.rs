//! Remote store seam
//!
//! The sync engine talks to the managed backend through this trait. The
//! concrete adapter is responsible for mapping its transport's raw error
//! signal into the `StoreError` classification; everything above this
//! seam branches on typed variants only.

use async_trait::async_trait;

use freelynk_core::{RecordId, StoreError, TableName, TableRow, UserId};

// ----------------------------------------------------------------------------
// Filters
// ----------------------------------------------------------------------------

/// Row filter for `select`. Results are returned in the store's delivery
/// order; the engine never re-sorts beyond arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Every row of the table
    All,
    /// Messages exchanged between two users, either direction
    Conversation { a: UserId, b: UserId },
    /// Messages involving one user, either direction
    Involving { user_id: UserId },
    /// Likes/comments attached to one post
    ByPost { post_id: RecordId },
    /// A like by a specific user on a specific post
    LikeBy { post_id: RecordId, user_id: UserId },
}

// ----------------------------------------------------------------------------
// Remote Store Trait
// ----------------------------------------------------------------------------

/// Read/write access to the remote row store.
///
/// All calls are non-blocking requests that suspend the calling task; the
/// remote store is the sole source of truth for conflict resolution.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Query rows matching a filter
    async fn select(&self, table: TableName, filter: Filter) -> Result<Vec<TableRow>, StoreError>;

    /// Insert a row; the returned row carries the server-assigned id
    async fn insert(&self, table: TableName, row: TableRow) -> Result<TableRow, StoreError>;

    /// Update the row with the given id; returns the stored row
    async fn update(
        &self,
        table: TableName,
        id: RecordId,
        row: TableRow,
    ) -> Result<TableRow, StoreError>;

    /// Delete the row with the given id
    async fn delete(&self, table: TableName, id: RecordId) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: RemoteStore + ?Sized> RemoteStore for std::sync::Arc<S> {
    async fn select(&self, table: TableName, filter: Filter) -> Result<Vec<TableRow>, StoreError> {
        (**self).select(table, filter).await
    }

    async fn insert(&self, table: TableName, row: TableRow) -> Result<TableRow, StoreError> {
        (**self).insert(table, row).await
    }

    async fn update(
        &self,
        table: TableName,
        id: RecordId,
        row: TableRow,
    ) -> Result<TableRow, StoreError> {
        (**self).update(table, id, row).await
    }

    async fn delete(&self, table: TableName, id: RecordId) -> Result<(), StoreError> {
        (**self).delete(table, id).await
    }
}
