//! freeLynk Core
//!
//! This crate provides the stable data model and communication protocol
//! for the freeLynk sync layer: mirrored record types, the typed change
//! feed and command/app-event protocol, structured store errors, the
//! media fallback codec and the soft-delete projector. The engine that
//! drives this protocol lives in `freelynk-sync`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod errors;
pub mod media;
pub mod profile;
pub mod records;
pub mod tombstone;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{AppEvent, ChangeEvent, ChangeOp, Command, TableName, TableRow};
pub use config::{ChannelConfig, SubscriptionConfig, SyncConfig};
pub use errors::{LynkError, LynkResult, Result, StoreError};
pub use profile::{ProfileCache, UserProfile};
pub use records::{ChatPreview, Comment, Like, MediaType, Message, Post};
pub use tombstone::{DisplayMessage, DELETED_TEXT};
pub use types::{RecordId, Timestamp, UserId};
