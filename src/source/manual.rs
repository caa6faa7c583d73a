//! In-process event source driven by hand
//!
//! Stands in for the OS monitors: transitions are injected through a
//! `ManualController`, and registering or releasing either monitor kind
//! can be made to fail.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{EventSource, MonitorKind, TransitionHandler};
use crate::error::{ListenerError, Result};
use crate::events::RawTransition;

/// Token for a monitor registered with a `ManualSource`
#[derive(Debug)]
pub struct ManualToken {
    id: u64,
    kind: MonitorKind,
}

#[derive(Default)]
struct ManualState {
    monitors: HashMap<u64, (MonitorKind, TransitionHandler)>,
    next_id: u64,
    failing: HashSet<MonitorKind>,
    failing_release: HashSet<MonitorKind>,
    registrations: usize,
    unregistrations: usize,
}

/// Event source whose transitions are injected by a `ManualController`
#[derive(Default)]
pub struct ManualSource {
    state: Arc<Mutex<ManualState>>,
}

/// Handle for injecting transitions into a `ManualSource`
#[derive(Clone)]
pub struct ManualController {
    state: Arc<Mutex<ManualState>>,
}

fn lock(state: &Mutex<ManualState>) -> MutexGuard<'_, ManualState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source together with its controller
    pub fn with_controller() -> (Self, ManualController) {
        let source = Self::new();
        let controller = source.controller();
        (source, controller)
    }

    pub fn controller(&self) -> ManualController {
        ManualController {
            state: Arc::clone(&self.state),
        }
    }
}

impl EventSource for ManualSource {
    type Token = ManualToken;

    fn register(&mut self, kind: MonitorKind, handler: TransitionHandler) -> Result<ManualToken> {
        let mut state = lock(&self.state);
        if state.failing.contains(&kind) {
            debug!(monitor = %kind, "simulated registration failure");
            return Err(ListenerError::PermissionDenied { monitor: kind });
        }

        let id = state.next_id;
        state.next_id += 1;
        state.registrations += 1;
        state.monitors.insert(id, (kind, handler));
        Ok(ManualToken { id, kind })
    }

    fn unregister(&mut self, token: ManualToken) -> Result<()> {
        let mut state = lock(&self.state);
        state.unregistrations += 1;
        let removed = state.monitors.remove(&token.id);

        // A simulated failure still releases the monitor, as a torn-down
        // tap that reports an error does
        if state.failing_release.contains(&token.kind) {
            return Err(ListenerError::UnregistrationFailed {
                monitor: token.kind,
                reason: "simulated release failure".to_string(),
            });
        }
        match removed {
            Some(_) => Ok(()),
            None => Err(ListenerError::UnregistrationFailed {
                monitor: token.kind,
                reason: "monitor was not registered".to_string(),
            }),
        }
    }
}

impl ManualController {
    /// Make every future registration of `kind` fail
    pub fn fail_registration(&self, kind: MonitorKind) {
        lock(&self.state).failing.insert(kind);
    }

    /// Let registrations of `kind` succeed again
    pub fn allow_registration(&self, kind: MonitorKind) {
        lock(&self.state).failing.remove(&kind);
    }

    /// Make every future unregistration of `kind` report an error
    pub fn fail_unregistration(&self, kind: MonitorKind) {
        lock(&self.state).failing_release.insert(kind);
    }

    /// Deliver a transition to every live monitor of `kind`
    ///
    /// Returns the number of monitors it reached.
    pub fn emit(&self, kind: MonitorKind, transition: RawTransition) -> usize {
        let handlers: Vec<TransitionHandler> = lock(&self.state)
            .monitors
            .values()
            .filter(|(monitor, _)| *monitor == kind)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        // Handlers run outside the lock, as they would on an OS thread
        for handler in &handlers {
            handler(transition);
        }
        handlers.len()
    }

    /// Deliver a transition through every live monitor, the way a focused
    /// host sees one physical event arrive twice
    pub fn emit_all(&self, transition: RawTransition) -> usize {
        self.emit(MonitorKind::InFocus, transition) + self.emit(MonitorKind::Global, transition)
    }

    /// Kinds of the monitors currently registered
    pub fn active_monitors(&self) -> Vec<MonitorKind> {
        let mut kinds: Vec<MonitorKind> = lock(&self.state)
            .monitors
            .values()
            .map(|(kind, _)| *kind)
            .collect();
        kinds.sort_by_key(|kind| *kind == MonitorKind::Global);
        kinds
    }

    /// Successful registrations so far
    pub fn registrations(&self) -> usize {
        lock(&self.state).registrations
    }

    /// Unregister calls so far
    pub fn unregistrations(&self) -> usize {
        lock(&self.state).unregistrations
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn counting_handler() -> (TransitionHandler, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let handler: TransitionHandler = Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (handler, count)
    }

    #[test]
    fn test_emit_reaches_registered_kind() {
        let (mut source, controller) = ManualSource::with_controller();
        let (handler, count) = counting_handler();

        let token = assert_ok!(source.register(MonitorKind::Global, handler));
        assert_eq!(controller.emit(MonitorKind::InFocus, RawTransition::down(0, Instant::now())), 0);
        assert_eq!(controller.emit(MonitorKind::Global, RawTransition::down(0, Instant::now())), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert_ok!(source.unregister(token));
        assert_eq!(controller.emit(MonitorKind::Global, RawTransition::down(0, Instant::now())), 0);
        assert!(controller.active_monitors().is_empty());
    }

    #[test]
    fn test_simulated_failure() {
        let (mut source, controller) = ManualSource::with_controller();
        controller.fail_registration(MonitorKind::Global);
        let (handler, _) = counting_handler();

        let err = assert_err!(source.register(MonitorKind::Global, handler.clone()));
        assert!(matches!(
            err,
            ListenerError::PermissionDenied {
                monitor: MonitorKind::Global
            }
        ));
        assert_ok!(source.register(MonitorKind::InFocus, handler.clone()));

        controller.allow_registration(MonitorKind::Global);
        assert_ok!(source.register(MonitorKind::Global, handler));
        assert_eq!(controller.registrations(), 2);
        assert_eq!(
            controller.active_monitors(),
            vec![MonitorKind::InFocus, MonitorKind::Global]
        );
    }

    #[test]
    fn test_simulated_release_failure_still_releases() {
        let (mut source, controller) = ManualSource::with_controller();
        controller.fail_unregistration(MonitorKind::Global);
        let (handler, count) = counting_handler();

        let token = assert_ok!(source.register(MonitorKind::Global, handler));
        assert_err!(source.unregister(token));
        assert!(controller.active_monitors().is_empty());
        assert_eq!(controller.emit_all(RawTransition::down(0, Instant::now())), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unregister_drops_handler() {
        let (mut source, _controller) = ManualSource::with_controller();
        let (handler, _) = counting_handler();
        let token = assert_ok!(source.register(MonitorKind::InFocus, Arc::clone(&handler)));
        assert_eq!(Arc::strong_count(&handler), 2);
        assert_ok!(source.unregister(token));
        assert_eq!(Arc::strong_count(&handler), 1);
    }
}
