//! Channel Communication Protocol Types
//!
//! This module defines the typed message protocol between the UI, the
//! sync engine and the remote change feed. All inter-task communication
//! flows through these channel message types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::records::{Comment, Like, MediaType, Message, Post};
use crate::types::{RecordId, UserId};

// ----------------------------------------------------------------------------
// Remote Relations
// ----------------------------------------------------------------------------

/// Remote relations the sync layer mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableName {
    Messages,
    Posts,
    PostLikes,
    PostComments,
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableName::Messages => write!(f, "messages"),
            TableName::Posts => write!(f, "posts"),
            TableName::PostLikes => write!(f, "post_likes"),
            TableName::PostComments => write!(f, "post_comments"),
        }
    }
}

// ----------------------------------------------------------------------------
// Change Feed Events: Remote Store → Sync Engine
// ----------------------------------------------------------------------------

/// Row-level operation reported by the change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A typed row carried by a change event or returned from a read.
///
/// `Unknown` holds payloads that did not match any mirrored relation's
/// shape; reducers drop them silently instead of crashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableRow {
    Message(Message),
    Post(Post),
    Like(Like),
    Comment(Comment),
    Unknown(serde_json::Value),
}

impl TableRow {
    /// The record id of the row, if the shape is recognized
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            TableRow::Message(m) => Some(m.id),
            TableRow::Post(p) => Some(p.id),
            TableRow::Like(l) => Some(l.id),
            TableRow::Comment(c) => Some(c.id),
            TableRow::Unknown(_) => None,
        }
    }
}

/// A row-level change notification from the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub op: ChangeOp,
    pub table: TableName,
    /// Previous row state, present on updates and deletes
    pub old: Option<TableRow>,
    /// New row state, present on inserts and updates
    pub new: Option<TableRow>,
}

impl ChangeEvent {
    /// Create an insert event
    pub fn insert(table: TableName, row: TableRow) -> Self {
        Self {
            op: ChangeOp::Insert,
            table,
            old: None,
            new: Some(row),
        }
    }

    /// Create an update event
    pub fn update(table: TableName, old: Option<TableRow>, new: TableRow) -> Self {
        Self {
            op: ChangeOp::Update,
            table,
            old,
            new: Some(new),
        }
    }

    /// Create a delete event
    pub fn delete(table: TableName, old: TableRow) -> Self {
        Self {
            op: ChangeOp::Delete,
            table,
            old: Some(old),
            new: None,
        }
    }

    /// The id the event targets: the new row's id, falling back to the
    /// old row's id for deletes
    pub fn target_id(&self) -> Option<RecordId> {
        self.new
            .as_ref()
            .and_then(TableRow::record_id)
            .or_else(|| self.old.as_ref().and_then(TableRow::record_id))
    }
}

// ----------------------------------------------------------------------------
// Command: UI → Sync Engine
// ----------------------------------------------------------------------------

/// Commands sent from view components to the sync engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Open a conversation with a counterpart and start mirroring it
    OpenConversation { counterpart: UserId },
    /// Close the current conversation and release its subscription
    CloseConversation,
    /// Send a message in the open conversation
    SendMessage {
        receiver: UserId,
        text: Option<String>,
        media_url: Option<String>,
        media_type: Option<MediaType>,
    },
    /// Soft-delete one of our own messages
    DeleteMessage { message_id: RecordId },
    /// Toggle a like on a post
    ToggleLike { post_id: RecordId },
    /// Publish a new post
    CreatePost {
        content: Option<String>,
        image: Option<String>,
        video: Option<String>,
    },
    /// Comment on a post
    AddComment { post_id: RecordId, content: String },
    /// Re-fetch the feed from the store
    RefreshFeed,
    /// Shut down the engine gracefully
    Shutdown,
}

// ----------------------------------------------------------------------------
// AppEvent: Sync Engine → UI
// ----------------------------------------------------------------------------

/// State-change notifications sent from the sync engine to view components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppEvent {
    /// The open conversation's message list changed
    ConversationUpdated {
        counterpart: UserId,
        message_count: usize,
    },
    /// The derived chat previews changed
    PreviewsUpdated { previews_count: usize },
    /// The feed's post list or derived counts changed
    FeedUpdated { post_count: usize },
    /// An optimistic send failed and was rolled back
    SendFailed { local_id: RecordId, reason: String },
    /// A non-fatal engine error the UI may want to surface
    EngineError { error: String },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Message;
    use uuid::Uuid;

    #[test]
    fn test_table_name_display() {
        assert_eq!(format!("{}", TableName::Messages), "messages");
        assert_eq!(format!("{}", TableName::PostLikes), "post_likes");
    }

    #[test]
    fn test_target_id_prefers_new_row() {
        let alice = UserId::random();
        let bob = UserId::random();
        let mut old = Message::optimistic_text(alice, bob, "old".to_string());
        old.id = RecordId::Server(Uuid::new_v4());
        let mut new = old.clone();
        new.text = Some("new".to_string());

        let event = ChangeEvent::update(
            TableName::Messages,
            Some(TableRow::Message(old.clone())),
            TableRow::Message(new),
        );
        assert_eq!(event.target_id(), Some(old.id));
    }

    #[test]
    fn test_target_id_falls_back_to_old_on_delete() {
        let alice = UserId::random();
        let bob = UserId::random();
        let mut msg = Message::optimistic_text(alice, bob, "bye".to_string());
        msg.id = RecordId::Server(Uuid::new_v4());

        let event = ChangeEvent::delete(TableName::Messages, TableRow::Message(msg.clone()));
        assert_eq!(event.target_id(), Some(msg.id));
    }

    #[test]
    fn test_unknown_row_has_no_id() {
        let row = TableRow::Unknown(serde_json::json!({ "surprise": true }));
        assert_eq!(row.record_id(), None);
    }
}
