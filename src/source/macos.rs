//! Keyboard monitors backed by macOS CGEventTap
//!
//! Each monitor runs on a dedicated thread with its own CFRunLoop. The
//! global monitor is a listen-only session tap; the in-focus monitor is an
//! annotated-session filter that passes every event through unmodified and
//! forwards only events targeted at this process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventTapProxy, CGEventType, EventField,
};
use tracing::{debug, error, info, warn};

use super::{EventSource, MonitorKind, TransitionHandler};
use crate::error::{ListenerError, Result};
use crate::events::{RawTransition, TransitionKind};
use crate::keys::{KeyCode, ModifierFlags};

/// How long the run loop runs before checking for shutdown
const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

/// Event source registering CGEventTap monitors
#[derive(Debug, Default)]
pub struct CgEventSource;

impl CgEventSource {
    pub fn new() -> Self {
        Self
    }
}

/// A running event tap thread
pub struct TapMonitor {
    kind: MonitorKind,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TapMonitor {
    pub fn kind(&self) -> MonitorKind {
        self.kind
    }

    fn shutdown(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| ListenerError::UnregistrationFailed {
                monitor: self.kind,
                reason: "event tap thread panicked".to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl Drop for TapMonitor {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.shutdown();
        }
    }
}

impl EventSource for CgEventSource {
    type Token = TapMonitor;

    fn register(&mut self, kind: MonitorKind, handler: TransitionHandler) -> Result<TapMonitor> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<()>>(1);

        let name = match kind {
            MonitorKind::InFocus => "keypress-focus-tap",
            MonitorKind::Global => "keypress-global-tap",
        };

        let thread_running = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(monitor = %kind, "event tap thread started");
                run_event_loop(kind, handler, thread_running, ready_tx);
                debug!(monitor = %kind, "event tap thread stopped");
            })
            .map_err(|e| ListenerError::ThreadSpawn {
                name,
                reason: e.to_string(),
            })?;

        let mut monitor = TapMonitor {
            kind,
            running,
            thread: Some(thread),
        };

        // The thread reports once the tap is live or has failed
        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(ListenerError::RegistrationFailed {
                monitor: kind,
                reason: "event tap thread exited before reporting".to_string(),
            })
        });

        match ready {
            Ok(()) => {
                info!(monitor = %kind, "event tap registered");
                Ok(monitor)
            }
            Err(e) => {
                let _ = monitor.shutdown();
                Err(e)
            }
        }
    }

    fn unregister(&mut self, mut token: TapMonitor) -> Result<()> {
        let result = token.shutdown();
        info!(monitor = %token.kind, "event tap unregistered");
        result
    }
}

/// Convert a CGEvent into a raw transition
fn transition_from(event_type: CGEventType, event: &CGEvent) -> Option<RawTransition> {
    let kind = match event_type {
        CGEventType::KeyDown => TransitionKind::Down,
        CGEventType::KeyUp => TransitionKind::Up,
        CGEventType::FlagsChanged => TransitionKind::FlagsChanged,
        _ => return None,
    };
    let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
    let key = KeyCode(u16::try_from(code).ok()?);

    Some(RawTransition::new(
        key,
        kind,
        Instant::now(),
        ModifierFlags(event.get_flags().bits()),
    ))
}

/// Create the tap, report readiness, then run the CFRunLoop until stopped
fn run_event_loop(
    kind: MonitorKind,
    handler: TransitionHandler,
    running: Arc<AtomicBool>,
    ready_tx: std_mpsc::SyncSender<Result<()>>,
) {
    let own_pid = i64::from(std::process::id());
    let disabled = Arc::new(AtomicBool::new(false));
    let tap_disabled = Arc::clone(&disabled);

    // CGEventTap callback - must be fast and non-blocking
    let callback = move |_proxy: CGEventTapProxy, event_type: CGEventType, event: &CGEvent| -> Option<CGEvent> {
        match event_type {
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                warn!(monitor = %kind, "event tap disabled, will re-enable");
                tap_disabled.store(true, Ordering::SeqCst);
            }
            _ => {
                let targeted = kind == MonitorKind::Global
                    || event.get_integer_value_field(EventField::EVENT_TARGET_UNIX_PROCESS_ID) == own_pid;
                if targeted {
                    if let Some(transition) = transition_from(event_type, event) {
                        handler(transition);
                    }
                }
            }
        }
        // Pass through unmodified so normal key handling continues
        Some(event.clone())
    };

    let (location, options) = match kind {
        MonitorKind::InFocus => (CGEventTapLocation::AnnotatedSession, CGEventTapOptions::Default),
        MonitorKind::Global => (CGEventTapLocation::Session, CGEventTapOptions::ListenOnly),
    };

    let tap = match CGEventTap::new(
        location,
        CGEventTapPlacement::HeadInsertEventTap,
        options,
        vec![CGEventType::KeyDown, CGEventType::KeyUp, CGEventType::FlagsChanged],
        callback,
    ) {
        Ok(tap) => tap,
        Err(()) => {
            error!(monitor = %kind, "failed to create event tap - is Accessibility permission granted?");
            let _ = ready_tx.send(Err(ListenerError::PermissionDenied { monitor: kind }));
            return;
        }
    };

    let run_loop_source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            let _ = ready_tx.send(Err(ListenerError::RegistrationFailed {
                monitor: kind,
                reason: "failed to create run loop source".to_string(),
            }));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }
    tap.enable();

    if ready_tx.send(Ok(())).is_err() {
        return;
    }

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, true);
        }

        if disabled.swap(false, Ordering::SeqCst) {
            tap.enable();
            info!(monitor = %kind, "event tap re-enabled");
        }
    }

    unsafe {
        run_loop.remove_source(&run_loop_source, kCFRunLoopCommonModes);
    }
    // Tap and handler are released when they go out of scope
}

#[cfg(test)]
mod tests {
    use core_graphics::event::CGEventFlags;

    use super::*;
    use crate::keys::flags;

    #[test]
    fn test_flag_masks_match_core_graphics() {
        assert_eq!(CGEventFlags::CGEventFlagAlphaShift.bits(), flags::CAPS_LOCK);
        assert_eq!(CGEventFlags::CGEventFlagShift.bits(), flags::SHIFT);
        assert_eq!(CGEventFlags::CGEventFlagControl.bits(), flags::CONTROL);
        assert_eq!(CGEventFlags::CGEventFlagAlternate.bits(), flags::OPTION);
        assert_eq!(CGEventFlags::CGEventFlagCommand.bits(), flags::COMMAND);
        assert_eq!(CGEventFlags::CGEventFlagSecondaryFn.bits(), flags::FUNCTION);
    }

    #[test]
    fn test_source_creation() {
        let source = CgEventSource::new();
        assert!(format!("{source:?}").contains("CgEventSource"));
    }
}
