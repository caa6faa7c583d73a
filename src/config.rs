//! Configuration loading and management

use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::sink::DEFAULT_QUEUE_CAPACITY;
use crate::tracker::DEFAULT_DUPLICATE_WINDOW;

/// Environment variable holding the duplicate window in milliseconds
pub const DUPLICATE_WINDOW_ENV: &str = "KEYPRESS_DUPLICATE_WINDOW_MS";
/// Environment variable holding the notification queue capacity
pub const QUEUE_CAPACITY_ENV: &str = "KEYPRESS_QUEUE_CAPACITY";

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Transitions closer than this to the previous accepted one are
    /// dropped; zero disables the guard
    pub duplicate_window: Duration,

    /// Presses that may wait for the consumer callback before new ones
    /// are dropped
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duplicate_window: DEFAULT_DUPLICATE_WINDOW,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(DUPLICATE_WINDOW_ENV) {
            let millis: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {DUPLICATE_WINDOW_ENV}: {raw:?}"))?;
            config.duplicate_window = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup(QUEUE_CAPACITY_ENV) {
            let capacity: usize = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {QUEUE_CAPACITY_ENV}: {raw:?}"))?;
            if capacity == 0 {
                bail!("{QUEUE_CAPACITY_ENV} must be greater than zero");
            }
            config.queue_capacity = capacity;
        }

        Ok(config)
    }
}
