//! Errors raised while acquiring or releasing keyboard monitors

use crate::source::MonitorKind;

/// Errors that can occur in the keypress listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to create {monitor} event tap - check Accessibility / Input Monitoring permissions")]
    PermissionDenied { monitor: MonitorKind },

    #[error("failed to register {monitor} monitor: {reason}")]
    RegistrationFailed { monitor: MonitorKind, reason: String },

    #[error("failed to unregister {monitor} monitor: {reason}")]
    UnregistrationFailed { monitor: MonitorKind, reason: String },

    #[error("keyboard monitoring is only supported on macOS")]
    UnsupportedPlatform,

    #[error("failed to spawn {name} thread: {reason}")]
    ThreadSpawn { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ListenerError>;
