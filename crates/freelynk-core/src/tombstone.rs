//! Soft-Delete Projection
//!
//! A deleted message is never removed from the local list; its content is
//! overwritten with a sentinel so ordering, position and list keys stay
//! stable. This module projects any message into a display-safe record.

use serde::{Deserialize, Serialize};

use crate::records::{MediaType, Message};

/// Reserved text marking a soft-deleted message. The remote row keeps its
/// identity; only the content is replaced.
pub const DELETED_TEXT: &str = "__MESSAGE_DELETED__";

/// Display-safe view of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub content: Option<String>,
    pub media: Option<(String, MediaType)>,
    pub deleted: bool,
}

/// Whether a message carries the deletion sentinel
pub fn is_tombstone(message: &Message) -> bool {
    message.text.as_deref() == Some(DELETED_TEXT)
}

/// Project a message into its display form.
///
/// Pure and total: handles every record shape without panicking,
/// including records missing every optional field. Tombstones always
/// project to `{ content: None, media: None, deleted: true }`; render
/// callers must offer no media and no further mutation actions for them.
pub fn project(message: &Message) -> DisplayMessage {
    if is_tombstone(message) {
        return DisplayMessage {
            content: None,
            media: None,
            deleted: true,
        };
    }

    let media = message
        .media_url
        .as_ref()
        .map(|url| (url.clone(), message.media_type.unwrap_or(MediaType::Text)));

    DisplayMessage {
        content: message.text.clone(),
        media,
        deleted: false,
    }
}

/// Rewrite a message into its tombstone form (sentinel text, no media)
pub fn tombstone_of(message: &Message) -> Message {
    Message {
        text: Some(DELETED_TEXT.to_string()),
        media_url: None,
        media_type: None,
        ..message.clone()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
