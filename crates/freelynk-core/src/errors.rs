//! Error types for the freeLynk sync layer
//!
//! This module contains the typed store-error classification consumed by
//! the schema-fallback adapter, plus the `LynkError` type that unifies
//! every failure the layer can surface. Fallback decisions are a pure
//! function of the `StoreError` variant, never of error-message text.

use crate::channel::TableName;

// ----------------------------------------------------------------------------
// Store Errors
// ----------------------------------------------------------------------------

/// Classified failure returned by the remote store.
///
/// The remote store adapter is responsible for mapping its transport's
/// raw error signal into one of these variants; everything above that
/// seam branches on variants only.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("column {column} does not exist on {table}")]
    MissingColumn { table: TableName, column: String },
    #[error("relation {table} does not exist")]
    MissingTable { table: TableName },
    #[error("no matching row in {table}")]
    NotFound { table: TableName },
    #[error("permission denied")]
    PermissionDenied,
    #[error("transient store failure: {reason}")]
    Transient { reason: String },
    #[error("store failure: {reason}")]
    Unknown { reason: String },
}

impl StoreError {
    /// Whether this failure means the remote schema lacks something the
    /// write expected. Only these variants make the fallback adapter
    /// re-encode and retry.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(
            self,
            StoreError::MissingColumn { .. } | StoreError::MissingTable { .. }
        )
    }

    /// Create a missing-column error
    pub fn missing_column<C: Into<String>>(table: TableName, column: C) -> Self {
        StoreError::MissingColumn {
            table,
            column: column.into(),
        }
    }

    /// Create a transient failure
    pub fn transient<R: Into<String>>(reason: R) -> Self {
        StoreError::Transient {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Layer Errors
// ----------------------------------------------------------------------------

/// Unified error type for the sync layer
#[derive(Debug, thiserror::Error)]
pub enum LynkError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Channel communication error (internal to the task architecture)
    #[error("channel error: {message}")]
    Channel { message: String },

    #[error("subscription error: {reason}")]
    Subscription { reason: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl LynkError {
    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        LynkError::Channel {
            message: message.into(),
        }
    }

    /// Create a subscription error with a reason
    pub fn subscription_error<T: Into<String>>(reason: T) -> Self {
        LynkError::Subscription {
            reason: reason.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        LynkError::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether this error should stop the sync task rather than be
    /// scoped to the operation that triggered it
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LynkError::Channel { .. } | LynkError::Configuration { .. }
        )
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, LynkError>;
pub type LynkResult<T> = Result<T>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_classification() {
        assert!(StoreError::missing_column(TableName::Posts, "video").is_schema_mismatch());
        assert!(StoreError::MissingTable {
            table: TableName::PostLikes
        }
        .is_schema_mismatch());
        assert!(!StoreError::transient("connection reset").is_schema_mismatch());
        assert!(!StoreError::PermissionDenied.is_schema_mismatch());
        assert!(!StoreError::NotFound {
            table: TableName::Messages
        }
        .is_schema_mismatch());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(LynkError::channel_error("closed").is_fatal());
        assert!(LynkError::config_error("bad buffer size").is_fatal());
        assert!(!LynkError::from(StoreError::PermissionDenied).is_fatal());
        assert!(!LynkError::subscription_error("lagged").is_fatal());
    }
}
