//! Channel Utilities
//!
//! Bounded tokio channels wiring the UI, the sync engine and the change
//! feed together. Buffer sizes come from `ChannelConfig`.

use std::fmt;

use crate::channel::communication::{AppEvent, ChangeEvent, Command};
use crate::config::ChannelConfig;

#[derive(Debug)]
pub enum ChannelError {
    ChannelFull,
    ChannelClosed,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::ChannelFull => write!(f, "Channel buffer is full"),
            ChannelError::ChannelClosed => write!(f, "Channel is closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

pub type CommandSender = tokio::sync::mpsc::Sender<Command>;
pub type CommandReceiver = tokio::sync::mpsc::Receiver<Command>;
pub type ChangeEventSender = tokio::sync::mpsc::Sender<ChangeEvent>;
pub type ChangeEventReceiver = tokio::sync::mpsc::Receiver<ChangeEvent>;
pub type AppEventSender = tokio::sync::mpsc::Sender<AppEvent>;
pub type AppEventReceiver = tokio::sync::mpsc::Receiver<AppEvent>;

// ----------------------------------------------------------------------------
// Channel Creation Utilities
// ----------------------------------------------------------------------------

/// Create bounded command channel (UI → Sync Engine)
pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    tokio::sync::mpsc::channel(config.command_buffer_size)
}

/// Create bounded change-event channel (Change Feed → Sync Engine)
pub fn create_change_event_channel(
    config: &ChannelConfig,
) -> (ChangeEventSender, ChangeEventReceiver) {
    tokio::sync::mpsc::channel(config.change_event_buffer_size)
}

/// Create bounded app-event channel (Sync Engine → UI)
pub fn create_app_event_channel(config: &ChannelConfig) -> (AppEventSender, AppEventReceiver) {
    tokio::sync::mpsc::channel(config.app_event_buffer_size)
}

// ----------------------------------------------------------------------------
// Non-blocking Send Utilities
// ----------------------------------------------------------------------------

/// Non-blocking send for UI callers to keep the event loop interactive
pub trait NonBlockingSend<T> {
    fn try_send_non_blocking(&self, message: T) -> Result<(), ChannelError>;
}

impl NonBlockingSend<Command> for CommandSender {
    fn try_send_non_blocking(&self, command: Command) -> Result<(), ChannelError> {
        self.try_send(command).map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => ChannelError::ChannelFull,
            tokio::sync::mpsc::error::TrySendError::Closed(_) => ChannelError::ChannelClosed,
        })
    }
}

impl NonBlockingSend<AppEvent> for AppEventSender {
    fn try_send_non_blocking(&self, event: AppEvent) -> Result<(), ChannelError> {
        self.try_send(event).map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => ChannelError::ChannelFull,
            tokio::sync::mpsc::error::TrySendError::Closed(_) => ChannelError::ChannelClosed,
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_config_defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.command_buffer_size, 32);
        assert_eq!(config.change_event_buffer_size, 128);
        assert_eq!(config.app_event_buffer_size, 64);
    }

    #[tokio::test]
    async fn test_command_channel_creation() {
        let config = ChannelConfig::default();
        let (sender, mut receiver) = create_command_channel(&config);

        sender.send(Command::RefreshFeed).await.unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(received, Command::RefreshFeed);
    }

    #[tokio::test]
    async fn test_non_blocking_send_reports_full() {
        let config = ChannelConfig {
            command_buffer_size: 1,
            ..ChannelConfig::default()
        };
        let (sender, _receiver) = create_command_channel(&config);

        sender.try_send_non_blocking(Command::RefreshFeed).unwrap();
        let err = sender
            .try_send_non_blocking(Command::RefreshFeed)
            .unwrap_err();
        assert!(matches!(err, ChannelError::ChannelFull));
    }
}
