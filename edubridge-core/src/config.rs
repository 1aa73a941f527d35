//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, DomainError};

/// Top-level configuration for the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Notification dispatch settings
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl EngineConfig {
    /// Parse a config from TOML text
    pub fn from_toml(text: &str) -> CoreResult<Self> {
        toml::from_str(text).map_err(|e| DomainError::Validation(format!("invalid config: {e}")))
    }
}

/// Which domain events produce outbound notifications.
///
/// Delivery itself is a fire-and-forget concern behind [`crate::events::Notifier`];
/// these toggles only decide whether the engine hands an event to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Master switch for all notifications
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Notify the sponsor when a program is created
    #[serde(default = "default_true")]
    pub notify_created: bool,

    /// Notify the sponsor contact when a checkpoint becomes ready
    #[serde(default = "default_true")]
    pub notify_checkpoint_ready: bool,

    /// Notify the triggering admin when a checkpoint is acknowledged
    #[serde(default = "default_true")]
    pub notify_checkpoint_completed: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            notify_created: true,
            notify_checkpoint_ready: true,
            notify_checkpoint_completed: true,
        }
    }
}
