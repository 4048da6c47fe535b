//! Change Feed Subscriber
//!
//! Maintains one logical subscription per active view context (open
//! conversation, inbox, visible feed). Scopes are owned handles with an
//! acquire/release discipline: release is idempotent, drop releases, and
//! events arriving for a released scope are silently dropped.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use freelynk_core::channel::{AppEventSender, ChangeEventSender};
use freelynk_core::{
    AppEvent, ChangeEvent, LynkResult, SubscriptionConfig, TableName, TableRow, UserId,
};

// ----------------------------------------------------------------------------
// Subscription Scopes
// ----------------------------------------------------------------------------

/// Filter identifying which change events a subscription cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionScope {
    /// Messages exchanged between two users, either direction
    Conversation { a: UserId, b: UserId },
    /// Every message involving one user (drives chat previews)
    Inbox { me: UserId },
    /// Posts, likes and comments
    Feed,
}

impl SubscriptionScope {
    /// Whether an event falls inside this scope. Events whose payload
    /// shape is unrecognized never match any scope.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        let row = match event.new.as_ref().or(event.old.as_ref()) {
            Some(row) => row,
            None => return false,
        };

        match self {
            SubscriptionScope::Conversation { a, b } => match row {
                TableRow::Message(msg) => {
                    event.table == TableName::Messages && msg.involves_pair(a, b)
                }
                _ => false,
            },
            SubscriptionScope::Inbox { me } => match row {
                TableRow::Message(msg) => {
                    event.table == TableName::Messages
                        && (msg.sender_id == *me || msg.receiver_id == *me)
                }
                _ => false,
            },
            SubscriptionScope::Feed => matches!(
                event.table,
                TableName::Posts | TableName::PostLikes | TableName::PostComments
            ) && !matches!(row, TableRow::Unknown(_) | TableRow::Message(_)),
        }
    }
}

// ----------------------------------------------------------------------------
// Change Feed Trait
// ----------------------------------------------------------------------------

/// One live subscription to the remote change feed
pub struct FeedSubscription {
    scope: SubscriptionScope,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl FeedSubscription {
    /// Wrap a broadcast receiver carrying this scope's events
    pub fn new(scope: SubscriptionScope, receiver: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { scope, receiver }
    }

    /// The scope this subscription was opened with
    pub fn scope(&self) -> SubscriptionScope {
        self.scope
    }

    /// Next in-scope event. Lagged deliveries are skipped with a warning;
    /// `None` means the transport closed and the caller should
    /// re-subscribe with the same scope.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.scope.matches(&event) {
                        return Some(event);
                    }
                    // Out-of-scope traffic on a shared transport channel
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change feed lagged, continuing");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Subscription primitive exposed by the remote change feed transport
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a subscription for a scope. Must not block; delivery is
    /// asynchronous through the returned subscription.
    async fn subscribe(&self, scope: SubscriptionScope) -> LynkResult<FeedSubscription>;
}

#[async_trait]
impl<F: ChangeFeed + ?Sized> ChangeFeed for Arc<F> {
    async fn subscribe(&self, scope: SubscriptionScope) -> LynkResult<FeedSubscription> {
        (**self).subscribe(scope).await
    }
}

// ----------------------------------------------------------------------------
// Scope Registry and Handles
// ----------------------------------------------------------------------------

/// Identifier for one acquired scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(Uuid);

impl ScopeId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Registry of live scopes, shared between the engine task and the pump
/// tasks feeding it
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    active: DashMap<ScopeId, SubscriptionScope>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a scope, returning its owned handle
    pub fn acquire(self: &Arc<Self>, scope: SubscriptionScope) -> ScopeHandle {
        let id = ScopeId::new();
        self.active.insert(id, scope);
        debug!(?scope, "scope acquired");
        ScopeHandle {
            id,
            registry: Arc::clone(self),
        }
    }

    /// Whether a scope is still live
    pub fn is_active(&self, id: ScopeId) -> bool {
        self.active.contains_key(&id)
    }

    /// Number of live scopes
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    fn release(&self, id: ScopeId) {
        // Removing twice is a no-op; release must be idempotent
        if self.active.remove(&id).is_some() {
            debug!(?id, "scope released");
        }
    }
}

/// Owned handle to an acquired scope.
///
/// `release` is safe to call multiple times; dropping the handle
/// releases too. Once released, pump tasks stop forwarding this scope's
/// events and late deliveries are dropped.
#[derive(Debug)]
pub struct ScopeHandle {
    id: ScopeId,
    registry: Arc<ScopeRegistry>,
}

impl ScopeHandle {
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Release the scope. Idempotent.
    pub fn release(&self) {
        self.registry.release(self.id);
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

// ----------------------------------------------------------------------------
// Scope Pump
// ----------------------------------------------------------------------------

/// Forward a subscription's events into the engine channel for as long as
/// the scope stays live. On transport close, re-subscribes with the same
/// scope; the attempt counter resets on every successful re-subscribe, so
/// the limit bounds consecutive failures, not session lifetime. A scope
/// that cannot come back is surfaced as an `AppEvent` before the pump
/// stops.
pub async fn run_scope_pump<F: ChangeFeed>(
    feed: F,
    mut subscription: FeedSubscription,
    registry: Arc<ScopeRegistry>,
    scope_id: ScopeId,
    forward: ChangeEventSender,
    app_events: AppEventSender,
    config: SubscriptionConfig,
) {
    let scope = subscription.scope();
    let mut resubscribes = 0u32;

    loop {
        match subscription.next().await {
            Some(event) => {
                if !registry.is_active(scope_id) {
                    // Scope torn down while the event was in flight
                    debug!(?scope_id, "dropping event for released scope");
                    return;
                }
                if forward.send(event).await.is_err() {
                    info!("engine channel closed, stopping scope pump");
                    return;
                }
            }
            None => {
                if !registry.is_active(scope_id) {
                    return;
                }
                resubscribes += 1;
                if resubscribes > config.max_resubscribe_attempts {
                    warn!(?scope, "change feed closed, giving up after max re-subscribes");
                    let _ = app_events
                        .send(AppEvent::EngineError {
                            error: format!("subscription lost for {scope:?}"),
                        })
                        .await;
                    return;
                }
                tokio::time::sleep(config.resubscribe_delay).await;
                match feed.subscribe(scope).await {
                    Ok(next) => {
                        info!(?scope, attempt = resubscribes, "re-subscribed after drop");
                        subscription = next;
                        resubscribes = 0;
                    }
                    Err(err) => {
                        warn!(error = %err, "re-subscribe failed");
                        let _ = app_events
                            .send(AppEvent::EngineError {
                                error: err.to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use freelynk_core::{ChangeOp, Message, Post, RecordId, Timestamp};
    use uuid::Uuid;

    fn server_message(sender: UserId, receiver: UserId) -> Message {
        Message {
            id: RecordId::Server(Uuid::new_v4()),
            sender_id: sender,
            receiver_id: receiver,
            text: Some("hi".to_string()),
            media_url: None,
            media_type: None,
            created_at: Timestamp::now(),
            is_optimistic: false,
        }
    }

    #[test]
    fn test_conversation_scope_matches_both_directions() {
        let alice = UserId::random();
        let bob = UserId::random();
        let carol = UserId::random();
        let scope = SubscriptionScope::Conversation { a: alice, b: bob };

        let from_alice = ChangeEvent::insert(
            TableName::Messages,
            TableRow::Message(server_message(alice, bob)),
        );
        let from_bob = ChangeEvent::insert(
            TableName::Messages,
            TableRow::Message(server_message(bob, alice)),
        );
        let from_carol = ChangeEvent::insert(
            TableName::Messages,
            TableRow::Message(server_message(carol, bob)),
        );

        assert!(scope.matches(&from_alice));
        assert!(scope.matches(&from_bob));
        assert!(!scope.matches(&from_carol));
    }

    #[test]
    fn test_feed_scope_ignores_messages_and_unknown_rows() {
        let scope = SubscriptionScope::Feed;
        let alice = UserId::random();
        let bob = UserId::random();

        let message_event = ChangeEvent::insert(
            TableName::Messages,
            TableRow::Message(server_message(alice, bob)),
        );
        assert!(!scope.matches(&message_event));

        let malformed = ChangeEvent {
            op: ChangeOp::Insert,
            table: TableName::Posts,
            old: None,
            new: Some(TableRow::Unknown(serde_json::json!({"weird": 1}))),
        };
        assert!(!scope.matches(&malformed));

        let post_event = ChangeEvent::insert(
            TableName::Posts,
            TableRow::Post(Post {
                id: RecordId::Server(Uuid::new_v4()),
                author_id: alice,
                content: Some("hello".to_string()),
                image: None,
                video: None,
                created_at: Timestamp::now(),
                likes_count: 0,
                comments_count: 0,
            }),
        );
        assert!(scope.matches(&post_event));
    }

    #[test]
    fn test_double_release_is_safe() {
        let registry = Arc::new(ScopeRegistry::new());
        let handle = registry.acquire(SubscriptionScope::Feed);
        let id = handle.id();

        assert!(registry.is_active(id));
        handle.release();
        assert!(!registry.is_active(id));
        handle.release(); // second release must be a no-op
        assert!(!registry.is_active(id));
        drop(handle); // drop after release must not panic
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_drop_releases_scope() {
        let registry = Arc::new(ScopeRegistry::new());
        let id = {
            let handle = registry.acquire(SubscriptionScope::Feed);
            handle.id()
        };
        assert!(!registry.is_active(id));
    }

    /// Feed stub minting a fresh broadcast channel per subscribe call
    struct ReopeningFeed {
        senders: std::sync::Mutex<Vec<broadcast::Sender<ChangeEvent>>>,
    }

    impl ReopeningFeed {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                senders: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn drop_transport(&self) {
            self.senders.lock().unwrap().pop();
        }

        async fn wait_for_transport(&self) -> broadcast::Sender<ChangeEvent> {
            tokio::time::timeout(core::time::Duration::from_secs(2), async {
                loop {
                    if let Some(tx) = self.senders.lock().unwrap().last().cloned() {
                        return tx;
                    }
                    tokio::time::sleep(core::time::Duration::from_millis(5)).await;
                }
            })
            .await
            .expect("timed out waiting for re-subscribe")
        }
    }

    #[async_trait]
    impl ChangeFeed for ReopeningFeed {
        async fn subscribe(&self, scope: SubscriptionScope) -> LynkResult<FeedSubscription> {
            let (tx, rx) = broadcast::channel(8);
            self.senders.lock().unwrap().push(tx);
            Ok(FeedSubscription::new(scope, rx))
        }
    }

    fn post_event() -> ChangeEvent {
        ChangeEvent::insert(
            TableName::Posts,
            TableRow::Post(Post {
                id: RecordId::Server(Uuid::new_v4()),
                author_id: UserId::random(),
                content: Some("back online".to_string()),
                image: None,
                video: None,
                created_at: Timestamp::now(),
                likes_count: 0,
                comments_count: 0,
            }),
        )
    }

    #[tokio::test]
    async fn test_pump_recovers_from_repeated_transport_drops() {
        let feed = ReopeningFeed::new();
        let registry = Arc::new(ScopeRegistry::new());
        let handle = registry.acquire(SubscriptionScope::Feed);
        let (forward_tx, mut forward_rx) = tokio::sync::mpsc::channel(8);
        let (app_tx, _app_rx) = tokio::sync::mpsc::channel(8);
        let config = SubscriptionConfig {
            resubscribe_delay: core::time::Duration::ZERO,
            max_resubscribe_attempts: 1,
        };

        let subscription = feed.subscribe(SubscriptionScope::Feed).await.unwrap();
        tokio::spawn(run_scope_pump(
            Arc::clone(&feed),
            subscription,
            Arc::clone(&registry),
            handle.id(),
            forward_tx,
            app_tx,
            config,
        ));

        // Two drop/recover rounds against a one-attempt limit: the
        // counter must reset after each successful re-subscribe
        for _ in 0..2 {
            feed.drop_transport();
            let tx = feed.wait_for_transport().await;
            tx.send(post_event()).unwrap();

            let forwarded =
                tokio::time::timeout(core::time::Duration::from_secs(2), forward_rx.recv())
                    .await
                    .expect("timed out waiting for forwarded event")
                    .expect("pump stopped");
            assert_eq!(forwarded.table, TableName::Posts);
        }
    }

    #[tokio::test]
    async fn test_pump_surfaces_exhausted_resubscribes() {
        let feed = ReopeningFeed::new();
        let registry = Arc::new(ScopeRegistry::new());
        let handle = registry.acquire(SubscriptionScope::Feed);
        let (forward_tx, _forward_rx) = tokio::sync::mpsc::channel(8);
        let (app_tx, mut app_rx) = tokio::sync::mpsc::channel(8);
        let config = SubscriptionConfig {
            resubscribe_delay: core::time::Duration::ZERO,
            max_resubscribe_attempts: 0,
        };

        let subscription = feed.subscribe(SubscriptionScope::Feed).await.unwrap();
        tokio::spawn(run_scope_pump(
            Arc::clone(&feed),
            subscription,
            Arc::clone(&registry),
            handle.id(),
            forward_tx,
            app_tx,
            config,
        ));

        feed.drop_transport();
        let event = tokio::time::timeout(core::time::Duration::from_secs(2), app_rx.recv())
            .await
            .expect("timed out waiting for app event")
            .expect("pump stopped without surfacing");
        assert!(matches!(event, AppEvent::EngineError { .. }));
    }

    #[tokio::test]
    async fn test_subscription_filters_out_of_scope_events() {
        let alice = UserId::random();
        let bob = UserId::random();
        let carol = UserId::random();
        let (tx, rx) = broadcast::channel(8);
        let mut sub = FeedSubscription::new(
            SubscriptionScope::Conversation { a: alice, b: bob },
            rx,
        );

        tx.send(ChangeEvent::insert(
            TableName::Messages,
            TableRow::Message(server_message(carol, bob)),
        ))
        .unwrap();
        tx.send(ChangeEvent::insert(
            TableName::Messages,
            TableRow::Message(server_message(alice, bob)),
        ))
        .unwrap();

        let event = sub.next().await.unwrap();
        let TableRow::Message(msg) = event.new.unwrap() else {
            panic!("expected message row");
        };
        assert_eq!(msg.sender_id, alice);
    }
}
