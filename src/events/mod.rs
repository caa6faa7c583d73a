//! Events module for keyboard transitions and press notifications
//!
//! `RawTransition` is what an event source observes; `KeyPressEvent` is the
//! single-fire notification handed to consumers.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::keys::{KeyCode, ModifierFlags};

/// Kind of raw keyboard transition reported by the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    /// Regular key pressed (or auto-repeated)
    Down,
    /// Regular key released
    Up,
    /// Modifier flag word changed
    FlagsChanged,
}

/// One observed OS keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTransition {
    pub key: KeyCode,
    pub kind: TransitionKind,
    /// When the event was observed
    pub timestamp: Instant,
    /// Full modifier flag word at the time of the event
    pub flags: ModifierFlags,
}

impl RawTransition {
    pub fn new(key: KeyCode, kind: TransitionKind, timestamp: Instant, flags: ModifierFlags) -> Self {
        Self {
            key,
            kind,
            timestamp,
            flags,
        }
    }

    /// Key down for a raw virtual key code, no modifiers
    pub fn down(key: u16, timestamp: Instant) -> Self {
        Self::new(KeyCode(key), TransitionKind::Down, timestamp, ModifierFlags::EMPTY)
    }

    pub fn up(key: u16, timestamp: Instant) -> Self {
        Self::new(KeyCode(key), TransitionKind::Up, timestamp, ModifierFlags::EMPTY)
    }

    pub fn flags_changed(key: u16, timestamp: Instant, flags: impl Into<ModifierFlags>) -> Self {
        Self::new(KeyCode(key), TransitionKind::FlagsChanged, timestamp, flags.into())
    }

    /// Replace the modifier flags carried by this transition
    pub fn with_flags(mut self, flags: impl Into<ModifierFlags>) -> Self {
        self.flags = flags.into();
        self
    }
}

/// A single accepted key press, emitted once per physical press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "keypress", rename_all = "camelCase")]
pub struct KeyPressEvent {
    /// Virtual key code of the pressed key
    pub key_code: KeyCode,
    /// Modifier flags at the instant of the press
    pub modifier_flags: ModifierFlags,
}

impl KeyPressEvent {
    pub fn new(key_code: KeyCode, modifier_flags: ModifierFlags) -> Self {
        Self {
            key_code,
            modifier_flags,
        }
    }
}

impl std::fmt::Display for KeyPressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "KEYPRESS key={} flags={:#x}",
            self.key_code, self.modifier_flags.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = KeyPressEvent::new(KeyCode(56), ModifierFlags(0x0002_0000));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"keypress""#));
        assert!(json.contains(r#""keyCode":56"#));
        assert!(json.contains(r#""modifierFlags":131072"#));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"keypress","keyCode":0,"modifierFlags":256}"#;
        let event: KeyPressEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.key_code, KeyCode(0));
        assert_eq!(event.modifier_flags, ModifierFlags(256));
    }

    #[test]
    fn test_event_display() {
        let event = KeyPressEvent::new(KeyCode(12), ModifierFlags(0x0010_0000));
        assert_eq!(event.to_string(), "KEYPRESS key=12 flags=0x100000");
    }
}
