//! Press tracker implementation
//!
//! Converts the raw, duplicated transition stream from both monitors into
//! single-fire key presses. Regular keys are tracked by down/up transitions;
//! modifier keys by edges of their bit in the flags-changed word.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::events::{KeyPressEvent, RawTransition, TransitionKind};
use crate::keys::{KeyCode, Modifier, ModifierFlags};

/// Default window within which a transition is treated as a duplicate of
/// the previous accepted one
pub const DEFAULT_DUPLICATE_WINDOW: Duration = Duration::from_millis(10);

/// Whether a key is currently held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PressState {
    #[default]
    Released,
    Pressed,
}

impl std::fmt::Display for PressState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PressState::Released => write!(f, "Released"),
            PressState::Pressed => write!(f, "Pressed"),
        }
    }
}

/// Counters describing what the tracker did with its input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Transitions handed to the tracker
    pub transitions: u64,
    /// Presses emitted
    pub emitted: u64,
    /// Transitions dropped by the duplicate window
    pub duplicates: u64,
    /// Down transitions for a key that was already held
    pub repeats: u64,
}

/// Edge of a modifier bit between two flag words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Rising,
    Falling,
    Unchanged,
}

impl Edge {
    fn between(previous: ModifierFlags, current: ModifierFlags, modifier: Modifier) -> Self {
        match (previous.contains(modifier), current.contains(modifier)) {
            (false, true) => Edge::Rising,
            (true, false) => Edge::Falling,
            _ => Edge::Unchanged,
        }
    }
}

/// Per-listener debounce and press-state tracker
#[derive(Debug)]
pub struct PressTracker {
    /// Keys currently held; absent keys are released
    keys: HashMap<KeyCode, PressState>,
    /// Flag word from the last accepted flags-changed transition
    last_flags: ModifierFlags,
    /// Last transition that passed the duplicate window
    last_accepted: Option<RawTransition>,
    duplicate_window: Duration,
    stats: TrackerStats,
}

impl Default for PressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_WINDOW)
    }
}

impl PressTracker {
    /// Create a tracker with the given duplicate window (zero disables it)
    pub fn new(duplicate_window: Duration) -> Self {
        Self {
            keys: HashMap::new(),
            last_flags: ModifierFlags::EMPTY,
            last_accepted: None,
            duplicate_window,
            stats: TrackerStats::default(),
        }
    }

    /// Current press state of `key`
    pub fn press_state(&self, key: KeyCode) -> PressState {
        self.keys.get(&key).copied().unwrap_or_default()
    }

    /// Modifier flags last seen on a flags-changed transition
    pub fn last_flags(&self) -> ModifierFlags {
        self.last_flags
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Forget every held key and the last seen modifier flags
    pub fn reset(&mut self) {
        self.keys.clear();
        self.last_flags = ModifierFlags::EMPTY;
        self.last_accepted = None;
    }

    /// Process one raw transition, returning the press it produces, if any
    pub fn process(&mut self, transition: &RawTransition) -> Option<KeyPressEvent> {
        self.stats.transitions += 1;

        if self.is_duplicate(transition) {
            self.stats.duplicates += 1;
            trace!(key = %transition.key, kind = ?transition.kind, "duplicate transition dropped");
            return None;
        }
        self.last_accepted = Some(*transition);

        let event = if transition.key.is_modifier() {
            self.handle_modifier(transition)
        } else {
            self.handle_regular(transition)
        };

        if let Some(event) = &event {
            self.stats.emitted += 1;
            debug!(key = %event.key_code, flags = event.modifier_flags.0, "key press accepted");
        }
        event
    }

    /// Check the transition against the coarse duplicate window
    ///
    /// Only a repeat of the last accepted transition (same key, kind and
    /// flags) inside the window is a duplicate; other keys' transitions
    /// are never dropped.
    fn is_duplicate(&self, transition: &RawTransition) -> bool {
        if self.duplicate_window.is_zero() {
            return false;
        }
        match &self.last_accepted {
            Some(last) if last.key == transition.key
                && last.kind == transition.kind
                && last.flags == transition.flags =>
            {
                // An out-of-order timestamp saturates to zero and counts as a duplicate
                transition.timestamp.saturating_duration_since(last.timestamp) < self.duplicate_window
            }
            _ => false,
        }
    }

    /// Handle a transition for a key outside the modifier range
    fn handle_regular(&mut self, transition: &RawTransition) -> Option<KeyPressEvent> {
        match transition.kind {
            TransitionKind::Down => {
                if self.press_state(transition.key) == PressState::Pressed {
                    self.stats.repeats += 1;
                    trace!(key = %transition.key, "key repeat suppressed");
                    return None;
                }
                self.keys.insert(transition.key, PressState::Pressed);
                Some(KeyPressEvent::new(transition.key, transition.flags))
            }
            TransitionKind::Up => {
                self.keys.remove(&transition.key);
                None
            }
            TransitionKind::FlagsChanged => {
                // Keeps edge detection in sync for the modifier keys
                self.last_flags = transition.flags;
                None
            }
        }
    }

    /// Handle a transition for a key inside the modifier range
    fn handle_modifier(&mut self, transition: &RawTransition) -> Option<KeyPressEvent> {
        if transition.kind != TransitionKind::FlagsChanged {
            return None;
        }

        let previous = self.last_flags;
        self.last_flags = transition.flags;

        let (modifier, _side) = transition.key.modifier()?;

        match Edge::between(previous, transition.flags, modifier) {
            Edge::Rising => {
                if self.press_state(transition.key) == PressState::Pressed {
                    self.stats.repeats += 1;
                    return None;
                }
                self.keys.insert(transition.key, PressState::Pressed);
                Some(KeyPressEvent::new(transition.key, transition.flags))
            }
            Edge::Falling => {
                // The shared bit is clear, so neither side of the pair is held
                for key in modifier.key_codes() {
                    self.keys.remove(key);
                }
                None
            }
            Edge::Unchanged => None,
        }
    }
}
