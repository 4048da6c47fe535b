//! Command Handlers
//!
//! One method per UI command. Handlers mutate the task's mirror state,
//! perform remote writes through the fallback store, and return the app
//! events the UI needs to re-render. Optimistic writes follow the
//! insert-locally, write-remotely, purge-on-outcome discipline.

use tracing::{debug, warn};

use freelynk_core::tombstone;
use freelynk_core::{
    AppEvent, ChangeEvent, Command, Comment, Like, LynkResult, MediaType, Message, Post, RecordId,
    TableName, TableRow, Timestamp, UserId,
};

use crate::state::ConversationState;
use crate::store::{Filter, RemoteStore};
use crate::subscriber::{ChangeFeed, SubscriptionScope};
use crate::task::SyncTask;

impl<S, F> SyncTask<S, F>
where
    S: RemoteStore + 'static,
    F: ChangeFeed + Clone + 'static,
{
    /// Dispatch one command to its handler
    pub(crate) async fn handle_command(&mut self, command: Command) -> LynkResult<Vec<AppEvent>> {
        match command {
            Command::OpenConversation { counterpart } => {
                self.open_conversation(counterpart).await
            }
            Command::CloseConversation => {
                self.close_conversation();
                Ok(Vec::new())
            }
            Command::SendMessage {
                receiver,
                text,
                media_url,
                media_type,
            } => self.send_message(receiver, text, media_url, media_type).await,
            Command::DeleteMessage { message_id } => self.delete_message(message_id).await,
            Command::ToggleLike { post_id } => self.toggle_like(post_id).await,
            Command::CreatePost {
                content,
                image,
                video,
            } => self.create_post(content, image, video).await,
            Command::AddComment { post_id, content } => {
                self.add_comment(post_id, content).await
            }
            Command::RefreshFeed => self.refresh_feed().await,
            Command::Shutdown => {
                self.running = false;
                Ok(Vec::new())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Conversations
    // ------------------------------------------------------------------------

    /// Open a conversation: tear down any previous one, subscribe its
    /// scope, then fetch the existing rows
    async fn open_conversation(&mut self, counterpart: UserId) -> LynkResult<Vec<AppEvent>> {
        self.close_conversation();

        let scope = SubscriptionScope::Conversation {
            a: self.me,
            b: counterpart,
        };
        let handle = self.open_scope(scope).await?;

        let rows = self
            .store
            .select(
                TableName::Messages,
                Filter::Conversation {
                    a: self.me,
                    b: counterpart,
                },
            )
            .await?;

        let mut state = ConversationState::new(counterpart);
        state.log.replace(rows);
        let message_count = state.log.len();
        self.conversation = Some((handle, state));

        Ok(vec![AppEvent::ConversationUpdated {
            counterpart,
            message_count,
        }])
    }

    /// Release the open conversation's scope and drop its mirror. Late
    /// events for the released scope are dropped by the pump.
    fn close_conversation(&mut self) {
        if let Some((handle, state)) = self.conversation.take() {
            handle.release();
            debug!(counterpart = %state.counterpart, "conversation closed");
        }
    }

    // ------------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------------

    /// Send a message optimistically: the record appears locally under a
    /// tentative id before the remote write resolves, and is purged on
    /// either outcome
    async fn send_message(
        &mut self,
        receiver: UserId,
        text: Option<String>,
        media_url: Option<String>,
        media_type: Option<MediaType>,
    ) -> LynkResult<Vec<AppEvent>> {
        let message = match (text, media_url) {
            (_, Some(url)) => Message::optimistic_media(
                self.me,
                receiver,
                url,
                media_type.unwrap_or(MediaType::Image),
            ),
            (Some(text), None) if !text.trim().is_empty() => {
                Message::optimistic_text(self.me, receiver, text)
            }
            _ => {
                debug!("ignoring empty send");
                return Ok(Vec::new());
            }
        };
        let local_id = message.id;

        self.pending.track(local_id, receiver);
        self.inbox.push_optimistic(message.clone());
        let mut out = Vec::new();
        if let Some((_, convo)) = self.conversation.as_mut() {
            if convo.counterpart == receiver {
                convo.log.push_optimistic(message.clone());
                out.push(AppEvent::ConversationUpdated {
                    counterpart: receiver,
                    message_count: convo.log.len(),
                });
            }
        }
        out.push(self.previews_event());

        match self
            .store
            .insert(TableName::Messages, TableRow::Message(message))
            .await
        {
            Ok(stored) => {
                self.pending.mark_confirmed(&local_id);
                self.pending.purge(&local_id);
                out.extend(self.resolve_send(&local_id, receiver, Some(stored)));
            }
            Err(err) => {
                warn!(error = %err, %local_id, "send failed, rolling back optimistic record");
                self.stats.sends_failed += 1;
                self.pending.mark_failed(&local_id);
                self.pending.purge(&local_id);
                out.extend(self.resolve_send(&local_id, receiver, None));
                out.push(AppEvent::SendFailed {
                    local_id,
                    reason: err.to_string(),
                });
            }
        }
        Ok(out)
    }

    /// Purge the optimistic record and, on success, apply the canonical
    /// row. The canonical apply is idempotent, so it does not matter
    /// whether the feed event for the same server id won the race.
    fn resolve_send(
        &mut self,
        local_id: &RecordId,
        receiver: UserId,
        canonical: Option<TableRow>,
    ) -> Vec<AppEvent> {
        self.inbox.remove(local_id);
        if let Some((_, convo)) = self.conversation.as_mut() {
            convo.log.remove(local_id);
        }

        if let Some(row) = canonical {
            let event = ChangeEvent::insert(TableName::Messages, row);
            let inbox_scope = SubscriptionScope::Inbox { me: self.me };
            if inbox_scope.matches(&event) {
                self.inbox.apply(&event);
            }
            if let Some((_, convo)) = self.conversation.as_mut() {
                let scope = SubscriptionScope::Conversation {
                    a: self.me,
                    b: convo.counterpart,
                };
                if scope.matches(&event) {
                    convo.log.apply(&event);
                }
            }
        }

        let mut out = Vec::new();
        if let Some((_, convo)) = self.conversation.as_ref() {
            if convo.counterpart == receiver {
                out.push(AppEvent::ConversationUpdated {
                    counterpart: receiver,
                    message_count: convo.log.len(),
                });
            }
        }
        out.push(self.previews_event());
        out
    }

    /// Soft-delete an own message by rewriting it into its tombstone
    /// form. The row keeps its id and position.
    async fn delete_message(&mut self, message_id: RecordId) -> LynkResult<Vec<AppEvent>> {
        let found = self
            .conversation
            .as_ref()
            .and_then(|(_, c)| c.log.messages().iter().find(|m| m.id == message_id))
            .or_else(|| self.inbox.messages().iter().find(|m| m.id == message_id))
            .cloned();

        let Some(message) = found else {
            return Ok(vec![AppEvent::EngineError {
                error: format!("cannot delete unknown message {message_id}"),
            }]);
        };
        if message.sender_id != self.me {
            return Ok(vec![AppEvent::EngineError {
                error: "only own messages can be deleted".to_string(),
            }]);
        }
        if message.id.is_local() {
            // Still awaiting its server id; a tombstone would race the ack
            return Ok(vec![AppEvent::EngineError {
                error: format!("message {message_id} is still sending"),
            }]);
        }

        let tombstone = tombstone::tombstone_of(&message);
        let stored = self
            .store
            .update(
                TableName::Messages,
                message.id,
                TableRow::Message(tombstone),
            )
            .await?;

        let event = ChangeEvent::update(
            TableName::Messages,
            Some(TableRow::Message(message)),
            stored,
        );
        Ok(self.handle_change_event(&event))
    }

    // ------------------------------------------------------------------------
    // Feed
    // ------------------------------------------------------------------------

    /// Toggle a like. Check-then-act against the store: a concurrent
    /// toggle from another device can double up, and the next feed event
    /// or refresh converges the count.
    async fn toggle_like(&mut self, post_id: RecordId) -> LynkResult<Vec<AppEvent>> {
        let existing = self
            .store
            .select(
                TableName::PostLikes,
                Filter::LikeBy {
                    post_id,
                    user_id: self.me,
                },
            )
            .await?
            .into_iter()
            .next();

        let event = match existing {
            Some(row) => {
                let Some(like_id) = row.record_id() else {
                    return Ok(vec![AppEvent::EngineError {
                        error: "like row has no id".to_string(),
                    }]);
                };
                self.store.delete(TableName::PostLikes, like_id).await?;
                ChangeEvent::delete(TableName::PostLikes, row)
            }
            None => {
                let like = Like {
                    id: RecordId::next_local(),
                    post_id,
                    user_id: self.me,
                };
                let stored = self
                    .store
                    .insert(TableName::PostLikes, TableRow::Like(like))
                    .await?;
                ChangeEvent::insert(TableName::PostLikes, stored)
            }
        };

        // The feed event for this write dedups against the local apply
        Ok(self.handle_change_event(&event))
    }

    /// Publish a new post. Rich media columns fold through the fallback
    /// store when the remote schema lacks them.
    async fn create_post(
        &mut self,
        content: Option<String>,
        image: Option<String>,
        video: Option<String>,
    ) -> LynkResult<Vec<AppEvent>> {
        if content.is_none() && image.is_none() && video.is_none() {
            debug!("ignoring empty post");
            return Ok(Vec::new());
        }
        let post = Post {
            id: RecordId::next_local(),
            author_id: self.me,
            content,
            image,
            video,
            created_at: Timestamp::now(),
            likes_count: 0,
            comments_count: 0,
        };
        let stored = self
            .store
            .insert(TableName::Posts, TableRow::Post(post))
            .await?;

        let event = ChangeEvent::insert(TableName::Posts, stored);
        Ok(self.handle_change_event(&event))
    }

    /// Comment on a post
    async fn add_comment(
        &mut self,
        post_id: RecordId,
        content: String,
    ) -> LynkResult<Vec<AppEvent>> {
        if content.trim().is_empty() {
            debug!("ignoring empty comment");
            return Ok(Vec::new());
        }
        let comment = Comment {
            id: RecordId::next_local(),
            post_id,
            user_id: self.me,
            content,
            created_at: Timestamp::now(),
        };
        let stored = self
            .store
            .insert(TableName::PostComments, TableRow::Comment(comment))
            .await?;

        let event = ChangeEvent::insert(TableName::PostComments, stored);
        Ok(self.handle_change_event(&event))
    }

    /// Re-fetch every feed relation and replace the mirror wholesale
    pub(crate) async fn refresh_feed(&mut self) -> LynkResult<Vec<AppEvent>> {
        let posts = self.store.select(TableName::Posts, Filter::All).await?;
        let likes = self.store.select(TableName::PostLikes, Filter::All).await?;
        let comments = self
            .store
            .select(TableName::PostComments, Filter::All)
            .await?;
        self.feed_state.replace(posts, likes, comments);

        Ok(vec![AppEvent::FeedUpdated {
            post_count: self.feed_state.post_count(),
        }])
    }

    /// Re-fetch every message involving `me` for the chat previews
    pub(crate) async fn refresh_inbox(&mut self) -> LynkResult<Vec<AppEvent>> {
        let rows = self
            .store
            .select(TableName::Messages, Filter::Involving { user_id: self.me })
            .await?;
        self.inbox.replace(rows);

        Ok(vec![self.previews_event()])
    }
}
