//! Sync Engine Task
//!
//! The single task that owns every piece of mirror state. UI commands and
//! change-feed events are serialized through one `tokio::select!` loop, so
//! reducers never need locks and every state transition has one writer.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use freelynk_core::channel::{
    create_change_event_channel, AppEventSender, ChangeEventReceiver, ChangeEventSender,
    CommandReceiver,
};
use freelynk_core::{
    AppEvent, ChangeEvent, LynkError, LynkResult, ProfileCache, SyncConfig, TableName, UserId,
};

use crate::fallback::FallbackStore;
use crate::optimistic::PendingTracker;
use crate::state::{chat_previews, ConversationState, FeedState, MessageLog};
use crate::store::RemoteStore;
use crate::subscriber::{run_scope_pump, ChangeFeed, ScopeHandle, ScopeRegistry, SubscriptionScope};

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Counters maintained by the sync task
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    pub commands_processed: u64,
    pub events_applied: u64,
    pub events_dropped: u64,
    pub sends_failed: u64,
}

// ----------------------------------------------------------------------------
// Sync Task
// ----------------------------------------------------------------------------

/// The sync engine task. Owns the local mirror of every active view
/// context and drives it from commands and change-feed events.
pub struct SyncTask<S, F> {
    pub(crate) me: UserId,
    pub(crate) store: FallbackStore<S>,
    pub(crate) feed: F,
    pub(crate) config: SyncConfig,
    pub(crate) registry: Arc<ScopeRegistry>,
    command_receiver: CommandReceiver,
    change_event_receiver: ChangeEventReceiver,
    /// Cloned into every scope pump; also keeps the receiver open
    pub(crate) change_event_sender: ChangeEventSender,
    app_event_sender: AppEventSender,
    /// The open conversation, with the scope handle that keeps its
    /// subscription live
    pub(crate) conversation: Option<(ScopeHandle, ConversationState)>,
    /// Every message involving `me`; drives the chat previews
    pub(crate) inbox: MessageLog,
    pub(crate) inbox_handle: Option<ScopeHandle>,
    pub(crate) feed_state: FeedState,
    pub(crate) feed_handle: Option<ScopeHandle>,
    pub(crate) pending: PendingTracker,
    pub(crate) profile: ProfileCache,
    pub(crate) stats: SyncStats,
    pub(crate) running: bool,
}

impl<S, F> SyncTask<S, F>
where
    S: RemoteStore + 'static,
    F: ChangeFeed + Clone + 'static,
{
    /// Create a new sync task for a signed-in user
    pub fn new(
        me: UserId,
        store: S,
        feed: F,
        config: SyncConfig,
        command_receiver: CommandReceiver,
        app_event_sender: AppEventSender,
    ) -> Self {
        let (change_event_sender, change_event_receiver) =
            create_change_event_channel(&config.channels);

        Self {
            me,
            store: FallbackStore::new(store),
            feed,
            config,
            registry: Arc::new(ScopeRegistry::new()),
            command_receiver,
            change_event_receiver,
            change_event_sender,
            app_event_sender,
            conversation: None,
            inbox: MessageLog::new(),
            inbox_handle: None,
            feed_state: FeedState::new(),
            feed_handle: None,
            pending: PendingTracker::new(),
            profile: ProfileCache::new(),
            stats: SyncStats::default(),
            running: true,
        }
    }

    /// Run the main sync loop until shutdown
    pub async fn run(&mut self) -> LynkResult<()> {
        info!(me = %self.me, "sync task starting");
        if let Err(err) = self.bootstrap().await {
            if err.is_fatal() {
                return Err(err);
            }
            // A transient store failure at startup leaves the mirrors
            // empty; the next refresh or feed event fills them in
            warn!(error = %err, "bootstrap incomplete");
            self.emit(AppEvent::EngineError {
                error: err.to_string(),
            })
            .await?;
        }

        while self.running {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => {
                            debug!(?command, "processing command");
                            self.stats.commands_processed += 1;
                            match self.handle_command(command).await {
                                Ok(events) => self.emit_all(events).await?,
                                Err(err) if err.is_fatal() => {
                                    error!(error = %err, "unrecoverable error, shutting down sync task");
                                    return Err(err);
                                }
                                Err(err) => {
                                    warn!(error = %err, "command failed");
                                    self.emit(AppEvent::EngineError {
                                        error: err.to_string(),
                                    })
                                    .await?;
                                }
                            }
                        }
                        None => {
                            info!("command channel closed, stopping sync task");
                            self.running = false;
                        }
                    }
                }
                event = self.change_event_receiver.recv() => {
                    // The task holds a sender clone, so recv never yields
                    // None while the task is alive
                    if let Some(event) = event {
                        let events = self.handle_change_event(&event);
                        self.emit_all(events).await?;
                    }
                }
            }
        }

        self.teardown();
        info!(
            commands = self.stats.commands_processed,
            applied = self.stats.events_applied,
            dropped = self.stats.events_dropped,
            "sync task stopped"
        );
        Ok(())
    }

    /// Subscribe the ambient scopes and run the initial fetches
    async fn bootstrap(&mut self) -> LynkResult<()> {
        let inbox_handle = self.open_scope(SubscriptionScope::Inbox { me: self.me }).await?;
        let feed_handle = self.open_scope(SubscriptionScope::Feed).await?;
        self.inbox_handle = Some(inbox_handle);
        self.feed_handle = Some(feed_handle);

        let mut events = self.refresh_inbox().await?;
        events.extend(self.refresh_feed().await?);
        self.emit_all(events).await
    }

    /// Release every live scope so pumps stop forwarding
    fn teardown(&mut self) {
        if let Some((handle, _)) = self.conversation.take() {
            handle.release();
        }
        if let Some(handle) = self.inbox_handle.take() {
            handle.release();
        }
        if let Some(handle) = self.feed_handle.take() {
            handle.release();
        }
    }

    /// Subscribe a scope and spawn the pump feeding its events into the
    /// engine channel
    pub(crate) async fn open_scope(
        &self,
        scope: SubscriptionScope,
    ) -> LynkResult<ScopeHandle> {
        let subscription = self.feed.subscribe(scope).await?;
        let handle = self.registry.acquire(scope);
        tokio::spawn(run_scope_pump(
            self.feed.clone(),
            subscription,
            Arc::clone(&self.registry),
            handle.id(),
            self.change_event_sender.clone(),
            self.app_event_sender.clone(),
            self.config.subscriptions.clone(),
        ));
        Ok(handle)
    }

    // ------------------------------------------------------------------------
    // Change Event Application
    // ------------------------------------------------------------------------

    /// Apply one change event to every mirror it falls into
    pub(crate) fn handle_change_event(&mut self, event: &ChangeEvent) -> Vec<AppEvent> {
        let mut out = Vec::new();
        let mut applied = false;

        match event.table {
            TableName::Messages => {
                let inbox_scope = SubscriptionScope::Inbox { me: self.me };
                if inbox_scope.matches(event) && self.inbox.apply(event) {
                    applied = true;
                    out.push(self.previews_event());
                }
                if let Some((_, convo)) = self.conversation.as_mut() {
                    let scope = SubscriptionScope::Conversation {
                        a: self.me,
                        b: convo.counterpart,
                    };
                    if scope.matches(event) && convo.log.apply(event) {
                        applied = true;
                        out.push(AppEvent::ConversationUpdated {
                            counterpart: convo.counterpart,
                            message_count: convo.log.len(),
                        });
                    }
                }
            }
            TableName::Posts | TableName::PostLikes | TableName::PostComments => {
                if self.feed_state.apply(event) {
                    applied = true;
                    out.push(AppEvent::FeedUpdated {
                        post_count: self.feed_state.post_count(),
                    });
                }
            }
        }

        if applied {
            self.stats.events_applied += 1;
        } else {
            debug!(op = ?event.op, table = %event.table, "change event dropped");
            self.stats.events_dropped += 1;
        }
        out
    }

    // ------------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------------

    pub(crate) fn previews_event(&self) -> AppEvent {
        AppEvent::PreviewsUpdated {
            previews_count: chat_previews(self.inbox.messages(), &self.me).len(),
        }
    }

    async fn emit(&self, event: AppEvent) -> LynkResult<()> {
        self.app_event_sender
            .send(event)
            .await
            .map_err(|_| LynkError::channel_error("app event channel closed"))
    }

    async fn emit_all(&self, events: Vec<AppEvent>) -> LynkResult<()> {
        for event in events {
            self.emit(event).await?;
        }
        Ok(())
    }

    /// Snapshot of the task's counters
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }
}
