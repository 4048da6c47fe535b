//! Schema-Fallback Store Adapter
//!
//! Wraps every store path so a remote schema missing a rich column does
//! not hard-fail the feature. A write rejected with a schema-mismatch
//! error is re-encoded through the media fallback codec (the unsupported
//! field folded into the text column under a reserved prefix) and retried
//! exactly once; reads run the inverse transform before rows reach the
//! reducers.

use async_trait::async_trait;
use tracing::{debug, warn};

use freelynk_core::media::{decode_fallback, encode_fallback, FallbackField};
use freelynk_core::{MediaType, RecordId, StoreError, TableName, TableRow};

use crate::store::{Filter, RemoteStore};

// ----------------------------------------------------------------------------
// Fallback Store
// ----------------------------------------------------------------------------

/// Decorator over a `RemoteStore` adding one-shot schema fallback
#[derive(Debug, Clone)]
pub struct FallbackStore<S> {
    inner: S,
}

impl<S: RemoteStore> FallbackStore<S> {
    /// Wrap a remote store
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

// ----------------------------------------------------------------------------
// Fold / Unfold
// ----------------------------------------------------------------------------

/// Re-encode a row so it no longer needs the missing column. Returns
/// `None` when the row has nothing foldable for that column, in which
/// case the original error must propagate.
fn fold_row(row: &TableRow, missing_column: &str) -> Option<TableRow> {
    match (row, missing_column) {
        (TableRow::Post(post), "video") => {
            let video = post.video.as_ref()?;
            let mut folded = post.clone();
            folded.content = Some(encode_fallback(FallbackField::PostVideo, video));
            folded.video = None;
            Some(TableRow::Post(folded))
        }
        (TableRow::Post(post), "image") => {
            let image = post.image.as_ref()?;
            let mut folded = post.clone();
            folded.content = Some(encode_fallback(FallbackField::PostImage, image));
            folded.image = None;
            Some(TableRow::Post(folded))
        }
        (TableRow::Message(message), "media_url" | "media_type") => {
            // The audio prefix stands for audio only; an image message
            // must not come back re-labelled, so its error propagates
            if message.media_type != Some(MediaType::Audio) {
                return None;
            }
            let media_url = message.media_url.as_ref()?;
            let mut folded = message.clone();
            folded.text = Some(encode_fallback(FallbackField::MessageAudio, media_url));
            folded.media_url = None;
            folded.media_type = None;
            Some(TableRow::Message(folded))
        }
        _ => None,
    }
}

/// Inverse transform applied to every row on the read side: recognized
/// prefixes are decoded back into the richer field, transparently to
/// callers.
pub fn unfold_row(row: TableRow) -> TableRow {
    match row {
        TableRow::Post(mut post) => {
            if let Some(content) = post.content.as_deref() {
                match decode_fallback(content) {
                    Some((FallbackField::PostVideo, payload)) => {
                        post.video = Some(payload.to_string());
                        post.content = None;
                    }
                    Some((FallbackField::PostImage, payload)) => {
                        post.image = Some(payload.to_string());
                        post.content = None;
                    }
                    _ => {}
                }
            }
            TableRow::Post(post)
        }
        TableRow::Message(mut message) => {
            if let Some(text) = message.text.as_deref() {
                if let Some((FallbackField::MessageAudio, payload)) = decode_fallback(text) {
                    message.media_url = Some(payload.to_string());
                    message.media_type = Some(MediaType::Audio);
                    message.text = None;
                }
            }
            TableRow::Message(message)
        }
        other => other,
    }
}

// ----------------------------------------------------------------------------
// RemoteStore Implementation
// ----------------------------------------------------------------------------

#[async_trait]
impl<S: RemoteStore> RemoteStore for FallbackStore<S> {
    async fn select(&self, table: TableName, filter: Filter) -> Result<Vec<TableRow>, StoreError> {
        let rows = self.inner.select(table, filter).await?;
        Ok(rows.into_iter().map(unfold_row).collect())
    }

    async fn insert(&self, table: TableName, row: TableRow) -> Result<TableRow, StoreError> {
        match self.inner.insert(table, row.clone()).await {
            Ok(stored) => Ok(unfold_row(stored)),
            Err(err) if err.is_schema_mismatch() => {
                let StoreError::MissingColumn { ref column, .. } = err else {
                    // MissingTable: no re-encoding can place this row
                    return Err(err);
                };
                let Some(folded) = fold_row(&row, column) else {
                    return Err(err);
                };
                warn!(%table, column, "schema mismatch on insert, retrying with folded payload");
                let stored = self.inner.insert(table, folded).await?;
                Ok(unfold_row(stored))
            }
            Err(err) => Err(err),
        }
    }

    async fn update(
        &self,
        table: TableName,
        id: RecordId,
        row: TableRow,
    ) -> Result<TableRow, StoreError> {
        match self.inner.update(table, id, row.clone()).await {
            Ok(stored) => Ok(unfold_row(stored)),
            Err(err) if err.is_schema_mismatch() => {
                let StoreError::MissingColumn { ref column, .. } = err else {
                    return Err(err);
                };
                let Some(folded) = fold_row(&row, column) else {
                    return Err(err);
                };
                debug!(%table, column, "schema mismatch on update, retrying with folded payload");
                let stored = self.inner.update(table, id, folded).await?;
                Ok(unfold_row(stored))
            }
            Err(err) => Err(err),
        }
    }

    async fn delete(&self, table: TableName, id: RecordId) -> Result<(), StoreError> {
        self.inner.delete(table, id).await
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
