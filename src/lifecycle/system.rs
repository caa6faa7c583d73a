//! Platform facade over the key press listener
//!
//! On macOS this wraps a listener over CGEventTap monitors. Anywhere else
//! no listener is built: the facade reports itself unavailable, never
//! listens, and start() fails with `UnsupportedPlatform`, logged at debug.

#[cfg(target_os = "macos")]
use std::sync::Arc;

#[cfg(not(target_os = "macos"))]
use tracing::debug;

use super::controller::start_outcome;
use crate::config::Config;
use crate::error::Result;
use crate::events::KeyPressEvent;
use crate::tracker::TrackerStats;

#[cfg(target_os = "macos")]
use super::KeyPressListener;
#[cfg(not(target_os = "macos"))]
use crate::error::ListenerError;
#[cfg(target_os = "macos")]
use crate::source::CgEventSource;

/// System-wide key press listener for the current platform
pub struct SystemListener {
    #[cfg(target_os = "macos")]
    inner: Arc<KeyPressListener<CgEventSource>>,
}

impl SystemListener {
    /// Create an idle listener delivering presses to `callback`
    #[cfg(target_os = "macos")]
    pub fn new<F>(config: &Config, callback: F) -> Self
    where
        F: FnMut(KeyPressEvent) + Send + 'static,
    {
        Self {
            inner: Arc::new(KeyPressListener::new(
                config.clone(),
                CgEventSource::new(),
                callback,
            )),
        }
    }

    /// Create an unavailable listener; `callback` is never invoked
    #[cfg(not(target_os = "macos"))]
    pub fn new<F>(config: &Config, callback: F) -> Self
    where
        F: FnMut(KeyPressEvent) + Send + 'static,
    {
        let _ = (config, callback);
        debug!("keyboard monitoring is not supported on this platform");
        Self {}
    }

    /// Whether keyboard monitoring exists on this platform at all
    pub fn is_available(&self) -> bool {
        cfg!(target_os = "macos")
    }

    /// Start listening, reporting why it failed
    pub fn try_start(&self) -> Result<()> {
        #[cfg(target_os = "macos")]
        {
            self.inner.try_start()
        }
        #[cfg(not(target_os = "macos"))]
        {
            Err(ListenerError::UnsupportedPlatform)
        }
    }

    pub fn start(&self) -> bool {
        start_outcome(self.try_start())
    }

    /// Start on the blocking pool, resolving once registration completes
    pub async fn start_async(&self) -> bool {
        #[cfg(target_os = "macos")]
        {
            self.inner.start_async().await
        }
        #[cfg(not(target_os = "macos"))]
        {
            self.start()
        }
    }

    pub fn stop(&self) -> bool {
        #[cfg(target_os = "macos")]
        {
            self.inner.stop()
        }
        #[cfg(not(target_os = "macos"))]
        {
            true
        }
    }

    pub fn is_listening(&self) -> bool {
        #[cfg(target_os = "macos")]
        {
            self.inner.is_listening()
        }
        #[cfg(not(target_os = "macos"))]
        {
            false
        }
    }

    pub fn stats(&self) -> Option<TrackerStats> {
        #[cfg(target_os = "macos")]
        {
            self.inner.stats()
        }
        #[cfg(not(target_os = "macos"))]
        {
            None
        }
    }
}
