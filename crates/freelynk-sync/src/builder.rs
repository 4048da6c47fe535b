//! Engine Builder and Handle
//!
//! `SyncBuilder` wires the channels, spawns the sync task and hands the
//! caller a `SyncHandle`: the command sender, the app-event stream and
//! the join handle, bundled so shutdown is one call.

use tokio::task::JoinHandle;
use tracing::info;

use freelynk_core::channel::{
    create_app_event_channel, create_command_channel, AppEventReceiver, CommandSender,
};
use freelynk_core::media::decode_fallback;
use freelynk_core::{AppEvent, Command, LynkError, LynkResult, SyncConfig, UserId, UserProfile};

use crate::store::RemoteStore;
use crate::subscriber::ChangeFeed;
use crate::task::SyncTask;

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

/// Builder for the sync engine
pub struct SyncBuilder<S, F> {
    me: UserId,
    store: S,
    feed: F,
    config: SyncConfig,
    profile: Option<UserProfile>,
}

impl<S, F> SyncBuilder<S, F>
where
    S: RemoteStore + 'static,
    F: ChangeFeed + Clone + 'static,
{
    /// Start building an engine for a signed-in user
    pub fn new(me: UserId, store: S, feed: F) -> Self {
        Self {
            me,
            store,
            feed,
            config: SyncConfig::default(),
            profile: None,
        }
    }

    /// Override the default configuration
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the profile cache with a last-known-good snapshot
    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Spawn the sync task and return its handle
    pub fn build(self) -> SyncHandle {
        let (command_sender, command_receiver) = create_command_channel(&self.config.channels);
        let (app_event_sender, app_events) = create_app_event_channel(&self.config.channels);

        let mut task = SyncTask::new(
            self.me,
            self.store,
            self.feed,
            self.config,
            command_receiver,
            app_event_sender,
        );
        if let Some(mut profile) = self.profile {
            // Legacy rows store the photo folded into a prefixed string
            let decoded = profile
                .photo_url
                .as_deref()
                .and_then(decode_fallback)
                .map(|(_, payload)| payload.to_string());
            if let Some(payload) = decoded {
                profile.photo_url = Some(payload);
            }
            task.profile.store(profile);
        }

        info!(me = %self.me, "spawning sync engine");
        let join = tokio::spawn(async move { task.run().await });

        SyncHandle {
            commands: command_sender,
            app_events,
            join,
        }
    }
}

// ----------------------------------------------------------------------------
// Handle
// ----------------------------------------------------------------------------

/// Running engine handle held by the UI layer
pub struct SyncHandle {
    commands: CommandSender,
    app_events: AppEventReceiver,
    join: JoinHandle<LynkResult<()>>,
}

impl SyncHandle {
    /// A cloneable command sender for view components
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    /// Send one command to the engine
    pub async fn send_command(&self, command: Command) -> LynkResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| LynkError::channel_error("command channel closed"))
    }

    /// Next app event, or `None` once the engine has stopped
    pub async fn next_app_event(&mut self) -> Option<AppEvent> {
        self.app_events.recv().await
    }

    /// Request a graceful shutdown and wait for the task to finish
    pub async fn shutdown(self) -> LynkResult<()> {
        let _ = self.commands.send(Command::Shutdown).await;
        match self.join.await {
            Ok(result) => result,
            Err(err) => Err(LynkError::channel_error(format!(
                "sync task terminated abnormally: {err}"
            ))),
        }
    }
}
