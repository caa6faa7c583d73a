//! Notification sink
//!
//! Hands accepted presses from the OS dispatch threads to the consumer
//! callback. Presses go through a bounded queue drained by one dispatcher
//! thread per listening session, so the OS side never waits on consumer
//! code and the callback is never entered concurrently.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

use crate::error::{ListenerError, Result};
use crate::events::KeyPressEvent;

/// Default number of presses that may wait for delivery
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Consumer callback receiving each accepted press
pub type KeyPressCallback = Box<dyn FnMut(KeyPressEvent) + Send + 'static>;

/// Callback shared by every dispatcher of one listener
#[derive(Clone)]
pub struct SharedCallback(Arc<Mutex<KeyPressCallback>>);

impl SharedCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(KeyPressEvent) + Send + 'static,
    {
        Self(Arc::new(Mutex::new(Box::new(callback))))
    }

    /// Invoke the callback, containing any panic it raises
    fn deliver(&self, event: KeyPressEvent) -> bool {
        let mut callback = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match panic::catch_unwind(AssertUnwindSafe(|| (*callback)(event))) {
            Ok(()) => true,
            Err(_) => {
                error!(key = %event.key_code, "keypress callback panicked, event dropped");
                false
            }
        }
    }
}

/// Producer side of the delivery queue
///
/// Clones are handed to monitor handlers; the dispatcher exits once every
/// clone is dropped and the queue is drained.
#[derive(Clone)]
pub struct NotificationSink {
    tx: mpsc::Sender<KeyPressEvent>,
}

impl NotificationSink {
    /// Spawn a dispatcher thread delivering to `callback`
    pub fn spawn(callback: SharedCallback, capacity: usize) -> Result<Self> {
        let (tx, mut rx) = mpsc::channel::<KeyPressEvent>(capacity.max(1));

        thread::Builder::new()
            .name("keypress-dispatch".to_string())
            .spawn(move || {
                debug!("keypress dispatcher started");
                while let Some(event) = rx.blocking_recv() {
                    callback.deliver(event);
                }
                debug!("keypress dispatcher stopped");
            })
            .map_err(|e| ListenerError::ThreadSpawn {
                name: "keypress-dispatch",
                reason: e.to_string(),
            })?;

        Ok(Self { tx })
    }

    /// Queue a press for delivery without blocking
    ///
    /// Returns false if the press was dropped.
    pub fn push(&self, event: KeyPressEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(key = %event.key_code, "notification queue full, key press dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("notification queue closed, key press dropped");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    use super::*;
    use crate::keys::{KeyCode, ModifierFlags};

    const WAIT: Duration = Duration::from_secs(2);

    fn press(code: u16) -> KeyPressEvent {
        KeyPressEvent::new(KeyCode(code), ModifierFlags::EMPTY)
    }

    #[test]
    fn test_delivers_in_order() {
        let (tx, rx) = std_mpsc::channel();
        let sink = NotificationSink::spawn(
            SharedCallback::new(move |event| {
                let _ = tx.send(event);
            }),
            16,
        )
        .unwrap();

        for code in 0..10 {
            assert!(sink.push(press(code)));
        }
        for code in 0..10 {
            assert_eq!(rx.recv_timeout(WAIT).unwrap(), press(code));
        }
    }

    #[test]
    fn test_callback_panic_is_contained() {
        let (tx, rx) = std_mpsc::channel();
        let sink = NotificationSink::spawn(
            SharedCallback::new(move |event: KeyPressEvent| {
                if event.key_code == KeyCode(1) {
                    panic!("consumer failure");
                }
                let _ = tx.send(event);
            }),
            16,
        )
        .unwrap();

        sink.push(press(1));
        sink.push(press(2));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), press(2));
    }

    #[test]
    fn test_queued_events_drain_after_sink_dropped() {
        let (tx, rx) = std_mpsc::channel();
        let (gate_tx, gate_rx) = std_mpsc::channel::<()>();
        let sink = NotificationSink::spawn(
            SharedCallback::new(move |event| {
                // Hold the first delivery until the producer is gone
                let _ = gate_rx.recv_timeout(WAIT);
                let _ = tx.send(event);
            }),
            16,
        )
        .unwrap();

        sink.push(press(1));
        sink.push(press(2));
        drop(sink);
        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), press(1));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), press(2));
        // Dispatcher exits and drops the callback along with its sender
        assert!(rx.recv_timeout(WAIT).is_err());
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (gate_tx, gate_rx) = std_mpsc::channel::<()>();
        let (started_tx, started_rx) = std_mpsc::channel::<()>();
        let sink = NotificationSink::spawn(
            SharedCallback::new(move |_| {
                let _ = started_tx.send(());
                let _ = gate_rx.recv_timeout(WAIT);
            }),
            1,
        )
        .unwrap();

        assert!(sink.push(press(1)));
        // First press is now inside the callback, the queue is empty
        started_rx.recv_timeout(WAIT).unwrap();
        assert!(sink.push(press(2)));
        assert!(!sink.push(press(3)));
        let _ = gate_tx.send(());
        let _ = gate_tx.send(());
    }
}
