//! Lifecycle controller
//!
//! Owns the event source, the monitor registrations and the per-session
//! tracker and sink. Two states: Idle and Listening.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{ListenerError, Result};
use crate::events::{KeyPressEvent, RawTransition};
use crate::sink::{NotificationSink, SharedCallback};
use crate::source::{EventSource, MonitorKind, TransitionHandler};
use crate::tracker::{PressTracker, TrackerStats};

/// Registration tokens for the two monitors of a session
struct ListenerHandle<T> {
    in_focus: T,
    global: T,
}

/// Resources that exist only while Listening
struct Session<T> {
    handle: ListenerHandle<T>,
    tracker: Arc<Mutex<PressTracker>>,
    // Dropped after the monitors are unregistered, closing the queue
    _sink: NotificationSink,
}

enum ListenerState<T> {
    Idle,
    Listening(Session<T>),
}

struct Inner<S: EventSource> {
    source: S,
    state: ListenerState<S::Token>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Single-callback key press listener over an event source
pub struct KeyPressListener<S: EventSource> {
    config: Config,
    callback: SharedCallback,
    inner: Mutex<Inner<S>>,
}

impl<S: EventSource> KeyPressListener<S> {
    /// Create an idle listener delivering presses to `callback`
    pub fn new<F>(config: Config, source: S, callback: F) -> Self
    where
        F: FnMut(KeyPressEvent) + Send + 'static,
    {
        Self {
            config,
            callback: SharedCallback::new(callback),
            inner: Mutex::new(Inner {
                source,
                state: ListenerState::Idle,
            }),
        }
    }

    /// Start listening; true if Listening afterwards
    pub fn start(&self) -> bool {
        start_outcome(self.try_start())
    }

    /// Start listening, reporting why registration failed
    ///
    /// A no-op when already Listening. On failure nothing stays registered.
    pub fn try_start(&self) -> Result<()> {
        let mut inner = lock(&self.inner);
        if matches!(inner.state, ListenerState::Listening(_)) {
            debug!("key press listener already listening");
            return Ok(());
        }

        let tracker = Arc::new(Mutex::new(PressTracker::new(self.config.duplicate_window)));
        let sink = NotificationSink::spawn(self.callback.clone(), self.config.queue_capacity)?;
        let handler = transition_handler(Arc::clone(&tracker), sink.clone());

        let in_focus = inner.source.register(MonitorKind::InFocus, Arc::clone(&handler))?;
        let global = match inner.source.register(MonitorKind::Global, handler) {
            Ok(token) => token,
            Err(e) => {
                // Roll back so no half-initialized session survives
                if let Err(rollback) = inner.source.unregister(in_focus) {
                    warn!(error = %rollback, "failed to roll back in-focus monitor");
                }
                return Err(e);
            }
        };

        inner.state = ListenerState::Listening(Session {
            handle: ListenerHandle { in_focus, global },
            tracker,
            _sink: sink,
        });

        info!(
            duplicate_window_ms = self.config.duplicate_window.as_millis() as u64,
            "key press listener started"
        );
        Ok(())
    }

    /// Stop listening; always ends Idle and returns true
    ///
    /// Safe to call from inside the callback: it never waits on delivery.
    pub fn stop(&self) -> bool {
        let mut inner = lock(&self.inner);
        let session = match std::mem::replace(&mut inner.state, ListenerState::Idle) {
            ListenerState::Idle => {
                debug!("key press listener already idle");
                return true;
            }
            ListenerState::Listening(session) => session,
        };

        let Session {
            handle,
            tracker,
            _sink: sink,
        } = session;

        for (kind, token) in [
            (MonitorKind::InFocus, handle.in_focus),
            (MonitorKind::Global, handle.global),
        ] {
            if let Err(e) = inner.source.unregister(token) {
                warn!(monitor = %kind, error = %e, "failed to unregister monitor");
            }
        }

        let stats = lock(&tracker).stats();
        // Monitors are gone; closing the queue lets the dispatcher drain and exit
        drop(sink);
        drop(tracker);

        info!(
            transitions = stats.transitions,
            emitted = stats.emitted,
            duplicates = stats.duplicates,
            repeats = stats.repeats,
            "key press listener stopped"
        );
        true
    }

    /// Whether the listener is currently Listening
    pub fn is_listening(&self) -> bool {
        matches!(lock(&self.inner).state, ListenerState::Listening(_))
    }

    /// Tracker counters for the current session, if Listening
    pub fn stats(&self) -> Option<TrackerStats> {
        match &lock(&self.inner).state {
            ListenerState::Listening(session) => Some(lock(&session.tracker).stats()),
            ListenerState::Idle => None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl<S: EventSource + 'static> KeyPressListener<S> {
    /// Start on the blocking pool, resolving once registration completes
    pub async fn start_async(self: &Arc<Self>) -> bool {
        let listener = Arc::clone(self);
        match tokio::task::spawn_blocking(move || listener.start()).await {
            Ok(started) => started,
            Err(e) => {
                error!(error = %e, "listener start task failed");
                false
            }
        }
    }
}

impl<S: EventSource> Drop for KeyPressListener<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Collapse a start result into the boolean surface, logging the failure
pub(crate) fn start_outcome(result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(ListenerError::UnsupportedPlatform) => {
            debug!("keyboard monitoring unavailable on this platform");
            false
        }
        Err(e) => {
            error!(error = %e, "failed to start key press listener");
            false
        }
    }
}

/// Build the handler both monitors feed; serializes tracker access
fn transition_handler(tracker: Arc<Mutex<PressTracker>>, sink: NotificationSink) -> TransitionHandler {
    Arc::new(move |transition: RawTransition| {
        let mut tracker = lock(&tracker);
        if let Some(event) = tracker.process(&transition) {
            // Pushed under the lock so delivery order matches acceptance order
            sink.push(event);
        }
    })
}
