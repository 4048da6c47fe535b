//! freeLynk Sync Engine
//!
//! The client-side reconciliation layer between the UI and the managed
//! remote store. One task owns the local mirror of every active view
//! context and drives it from two inputs: UI commands and row-level
//! change events pushed by the remote change feed.
//!
//! The engine is built from four pieces:
//!
//! - a change-feed subscriber with scoped, handle-owned subscriptions
//! - an optimistic mutation path with tentative local ids and
//!   purge-on-outcome reconciliation
//! - a schema-fallback store adapter that folds rich media columns into
//!   the text column when the remote schema lacks them
//! - a soft-delete projector that keeps deleted messages in place as
//!   tombstones
//!
//! ```no_run
//! # use freelynk_core::{Command, SyncConfig, UserId};
//! # use freelynk_sync::{ChangeFeed, RemoteStore, SyncBuilder};
//! # async fn example<S, F>(me: UserId, store: S, feed: F)
//! # where S: RemoteStore + 'static, F: ChangeFeed + Clone + 'static {
//! let mut handle = SyncBuilder::new(me, store, feed)
//!     .with_config(SyncConfig::default())
//!     .build();
//!
//! handle.send_command(Command::RefreshFeed).await.unwrap();
//! while let Some(_event) = handle.next_app_event().await {
//!     // drive the UI
//! }
//! # }
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod builder;
pub mod fallback;
mod handlers;
pub mod optimistic;
pub mod state;
pub mod store;
pub mod subscriber;
pub mod task;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use builder::{SyncBuilder, SyncHandle};
pub use fallback::{unfold_row, FallbackStore};
pub use optimistic::{PendingSend, PendingStatus, PendingTracker};
pub use state::{chat_previews, ConversationState, FeedState, MessageLog};
pub use store::{Filter, RemoteStore};
pub use subscriber::{
    run_scope_pump, ChangeFeed, FeedSubscription, ScopeHandle, ScopeId, ScopeRegistry,
    SubscriptionScope,
};
pub use task::{SyncStats, SyncTask};
