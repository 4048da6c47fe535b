//! Mirrored record types
//!
//! These structs mirror rows owned by the remote store. The client never
//! treats them as authoritative beyond the optimistic-write window; the
//! reducers in the sync engine are the only code allowed to mutate the
//! collections holding them.

use serde::{Deserialize, Serialize};

use crate::types::{RecordId, Timestamp, UserId};

// ----------------------------------------------------------------------------
// Media Type
// ----------------------------------------------------------------------------

/// Kind of payload a message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Text,
    Image,
    Audio,
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// A direct message between two users.
///
/// Exactly one of `text` / `media_url` is semantically primary, except
/// for tombstoned messages where `text` holds the deletion sentinel and
/// `media_url` is cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: RecordId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<MediaType>,
    pub created_at: Timestamp,
    /// True while this record exists only locally, awaiting the server ack
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_optimistic: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl Message {
    /// Create an optimistic text message with a tentative local id
    pub fn optimistic_text(sender_id: UserId, receiver_id: UserId, text: String) -> Self {
        Self {
            id: RecordId::next_local(),
            sender_id,
            receiver_id,
            text: Some(text),
            media_url: None,
            media_type: Some(MediaType::Text),
            created_at: Timestamp::now(),
            is_optimistic: true,
        }
    }

    /// Create an optimistic media message with a tentative local id
    pub fn optimistic_media(
        sender_id: UserId,
        receiver_id: UserId,
        media_url: String,
        media_type: MediaType,
    ) -> Self {
        Self {
            id: RecordId::next_local(),
            sender_id,
            receiver_id,
            text: None,
            media_url: Some(media_url),
            media_type: Some(media_type),
            created_at: Timestamp::now(),
            is_optimistic: true,
        }
    }

    /// Whether this message is part of the conversation between `a` and `b`
    pub fn involves_pair(&self, a: &UserId, b: &UserId) -> bool {
        (self.sender_id == *a && self.receiver_id == *b)
            || (self.sender_id == *b && self.receiver_id == *a)
    }

    /// The conversation counterpart from `me`'s perspective
    pub fn counterpart_of(&self, me: &UserId) -> UserId {
        if self.sender_id == *me {
            self.receiver_id
        } else {
            self.sender_id
        }
    }
}

// ----------------------------------------------------------------------------
// Post
// ----------------------------------------------------------------------------

/// A feed post.
///
/// `likes_count` and `comments_count` are derived client-side by joining
/// the post against the mirrored like/comment sets; they are only
/// accurate up to the most recent fetch or feed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: RecordId,
    pub author_id: UserId,
    pub content: Option<String>,
    pub image: Option<String>,
    pub video: Option<String>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub likes_count: usize,
    #[serde(default)]
    pub comments_count: usize,
}

// ----------------------------------------------------------------------------
// Comment
// ----------------------------------------------------------------------------

/// A comment on a post. Append-only from the client's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: RecordId,
    pub post_id: RecordId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: Timestamp,
}

// ----------------------------------------------------------------------------
// Like
// ----------------------------------------------------------------------------

/// A like row linking a user to a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Like {
    pub id: RecordId,
    pub post_id: RecordId,
    pub user_id: UserId,
}

// ----------------------------------------------------------------------------
// Chat Preview
// ----------------------------------------------------------------------------

/// Derived, non-persisted projection: the most recent message exchanged
/// with a counterpart. Recomputed whenever the message set changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPreview {
    pub counterpart: UserId,
    pub last_text: Option<String>,
    pub timestamp: Timestamp,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
