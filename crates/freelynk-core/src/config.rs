//! Centralized Configuration Management
//!
//! Consolidates the configuration structures used throughout the sync
//! layer into one place.

use core::time::Duration;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the task channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (UI → Sync Engine)
    pub command_buffer_size: usize,
    /// Buffer size for ChangeEvent channels (Change Feed → Sync Engine)
    pub change_event_buffer_size: usize,
    /// Buffer size for AppEvent channels (Sync Engine → UI)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,
            change_event_buffer_size: 128,
            app_event_buffer_size: 64,
        }
    }
}

// ----------------------------------------------------------------------------
// Subscription Configuration
// ----------------------------------------------------------------------------

/// Behavior of change-feed subscriptions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Delay before re-subscribing after a transport drop
    pub resubscribe_delay: Duration,
    /// Maximum consecutive re-subscribe attempts before giving up
    pub max_resubscribe_attempts: u32,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            resubscribe_delay: Duration::from_millis(500),
            max_resubscribe_attempts: 5,
        }
    }
}

// ----------------------------------------------------------------------------
// Sync Configuration
// ----------------------------------------------------------------------------

/// Top-level configuration for the sync engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    pub channels: ChannelConfig,
    pub subscriptions: SubscriptionConfig,
}

impl SyncConfig {
    /// Small buffers and no re-subscribe waits, for deterministic tests
    pub fn for_testing() -> Self {
        Self {
            channels: ChannelConfig {
                command_buffer_size: 8,
                change_event_buffer_size: 16,
                app_event_buffer_size: 16,
            },
            subscriptions: SubscriptionConfig {
                resubscribe_delay: Duration::from_millis(0),
                max_resubscribe_attempts: 1,
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buffer_sizes() {
        let config = SyncConfig::default();
        assert_eq!(config.channels.command_buffer_size, 32);
        assert_eq!(config.channels.change_event_buffer_size, 128);
        assert_eq!(config.channels.app_event_buffer_size, 64);
    }

    #[test]
    fn test_testing_profile_is_prompt() {
        let config = SyncConfig::for_testing();
        assert_eq!(config.subscriptions.resubscribe_delay, Duration::ZERO);
        assert_eq!(config.subscriptions.max_resubscribe_attempts, 1);
    }
}
