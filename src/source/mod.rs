//! Event source adapters
//!
//! An `EventSource` registers keyboard monitors with the OS and feeds every
//! raw transition they observe to a handler, unfiltered. The listener
//! registers two monitors per session: one for events targeting this
//! process while it is frontmost, one for events anywhere on the system.

#[cfg(target_os = "macos")]
mod macos;
mod manual;

use std::sync::Arc;

use crate::error::Result;
use crate::events::RawTransition;

#[cfg(target_os = "macos")]
pub use macos::{CgEventSource, TapMonitor};
pub use manual::{ManualController, ManualSource, ManualToken};

/// Callback invoked on the OS dispatch thread for every raw transition
pub type TransitionHandler = Arc<dyn Fn(RawTransition) + Send + Sync>;

/// Which of the two keyboard monitors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorKind {
    /// Events delivered to this process while it has focus
    InFocus,
    /// Events observed system-wide regardless of focus
    Global,
}

impl std::fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorKind::InFocus => write!(f, "in-focus"),
            MonitorKind::Global => write!(f, "global"),
        }
    }
}

/// A provider of raw keyboard transitions
pub trait EventSource: Send {
    /// Registration token, consumed on unregister
    type Token: Send;

    /// Register a monitor of the given kind
    ///
    /// Returns only once the monitor is live or has failed. The handler
    /// must be dropped when the monitor is unregistered.
    fn register(&mut self, kind: MonitorKind, handler: TransitionHandler) -> Result<Self::Token>;

    /// Unregister a monitor; no transitions reach its handler afterwards
    fn unregister(&mut self, token: Self::Token) -> Result<()>;
}
