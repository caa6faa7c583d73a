//! Key identifiers and modifier flag definitions
//!
//! Provides the virtual key code newtype, the raw macOS modifier flag word,
//! and the mapping from modifier key codes to the flag bit they drive.

use serde::{Deserialize, Serialize};

/// Device-independent modifier masks, bit-compatible with `CGEventFlags`
pub mod flags {
    /// Caps Lock (`kCGEventFlagMaskAlphaShift`)
    pub const CAPS_LOCK: u64 = 0x0001_0000;
    /// Shift (`kCGEventFlagMaskShift`)
    pub const SHIFT: u64 = 0x0002_0000;
    /// Control (`kCGEventFlagMaskControl`)
    pub const CONTROL: u64 = 0x0004_0000;
    /// Option/Alt (`kCGEventFlagMaskAlternate`)
    pub const OPTION: u64 = 0x0008_0000;
    /// Command (`kCGEventFlagMaskCommand`)
    pub const COMMAND: u64 = 0x0010_0000;
    /// Key is on the numeric keypad (`kCGEventFlagMaskNumericPad`)
    pub const NUMERIC_PAD: u64 = 0x0020_0000;
    /// Help (`kCGEventFlagMaskHelp`)
    pub const HELP: u64 = 0x0040_0000;
    /// Function/Globe (`kCGEventFlagMaskSecondaryFn`)
    pub const FUNCTION: u64 = 0x0080_0000;
}

/// First and last virtual key codes reserved for modifier keys
const MODIFIER_RANGE: std::ops::RangeInclusive<u16> = 0x36..=0x3F;

/// Opaque macOS virtual key code
///
/// Identifies a physical key, not a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u16);

impl KeyCode {
    /// Left Shift
    pub const LEFT_SHIFT: KeyCode = KeyCode(56);
    /// Right Shift
    pub const RIGHT_SHIFT: KeyCode = KeyCode(60);
    /// Caps Lock
    pub const CAPS_LOCK: KeyCode = KeyCode(57);

    /// Whether this code lies in the range the OS reports through
    /// flags-changed events instead of key down/up
    pub fn is_modifier(self) -> bool {
        MODIFIER_RANGE.contains(&self.0)
    }

    /// The modifier this key drives, if it is a modifier key
    pub fn modifier(self) -> Option<(Modifier, Side)> {
        modifier_for(self)
    }
}

impl From<u16> for KeyCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw modifier flag word as delivered with every keyboard event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModifierFlags(pub u64);

impl ModifierFlags {
    /// No modifiers held
    pub const EMPTY: ModifierFlags = ModifierFlags(0);

    /// Raw bits
    pub fn bits(self) -> u64 {
        self.0
    }

    /// Check if the bit for `modifier` is set
    pub fn contains(self, modifier: Modifier) -> bool {
        self.0 & modifier.mask() != 0
    }

    /// Return a copy with the bit for `modifier` set
    pub fn with(self, modifier: Modifier) -> Self {
        Self(self.0 | modifier.mask())
    }

    /// Return a copy with the bit for `modifier` cleared
    pub fn without(self, modifier: Modifier) -> Self {
        Self(self.0 & !modifier.mask())
    }
}

impl From<u64> for ModifierFlags {
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}

/// A modifier flag driven by one or two physical keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    CapsLock,
    Shift,
    Control,
    Option,
    Command,
    Function,
}

impl Modifier {
    /// The flag bit this modifier sets while held
    pub fn mask(self) -> u64 {
        match self {
            Modifier::CapsLock => flags::CAPS_LOCK,
            Modifier::Shift => flags::SHIFT,
            Modifier::Control => flags::CONTROL,
            Modifier::Option => flags::OPTION,
            Modifier::Command => flags::COMMAND,
            Modifier::Function => flags::FUNCTION,
        }
    }

    /// Every key code that drives this modifier's bit
    pub fn key_codes(self) -> &'static [KeyCode] {
        match self {
            Modifier::CapsLock => &[KeyCode(57)],
            Modifier::Shift => &[KeyCode(56), KeyCode(60)],
            Modifier::Control => &[KeyCode(59), KeyCode(62)],
            Modifier::Option => &[KeyCode(58), KeyCode(61)],
            Modifier::Command => &[KeyCode(55), KeyCode(54)],
            Modifier::Function => &[KeyCode(63)],
        }
    }
}

/// Which physical key of a left/right pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
    /// Modifier with a single physical key (Caps Lock, Function)
    Only,
}

/// Map a modifier key code to the modifier it drives and its side
pub fn modifier_for(key: KeyCode) -> Option<(Modifier, Side)> {
    let mapped = match key.0 {
        54 => (Modifier::Command, Side::Right),
        55 => (Modifier::Command, Side::Left),
        56 => (Modifier::Shift, Side::Left),
        57 => (Modifier::CapsLock, Side::Only),
        58 => (Modifier::Option, Side::Left),
        59 => (Modifier::Control, Side::Left),
        60 => (Modifier::Shift, Side::Right),
        61 => (Modifier::Option, Side::Right),
        62 => (Modifier::Control, Side::Right),
        63 => (Modifier::Function, Side::Only),
        _ => return None,
    };
    Some(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_range() {
        assert!(!KeyCode(0).is_modifier());
        assert!(!KeyCode(53).is_modifier());
        assert!(KeyCode(54).is_modifier());
        assert!(KeyCode(63).is_modifier());
        assert!(!KeyCode(64).is_modifier());
    }

    #[test]
    fn test_every_modifier_code_is_mapped() {
        for code in MODIFIER_RANGE {
            assert!(modifier_for(KeyCode(code)).is_some(), "code {code} unmapped");
        }
        assert_eq!(modifier_for(KeyCode(0)), None);
    }

    #[test]
    fn test_shift_pair_shares_bit() {
        let (left, left_side) = KeyCode::LEFT_SHIFT.modifier().unwrap();
        let (right, right_side) = KeyCode::RIGHT_SHIFT.modifier().unwrap();
        assert_eq!(left, right);
        assert_eq!(left.mask(), flags::SHIFT);
        assert_eq!(left_side, Side::Left);
        assert_eq!(right_side, Side::Right);
    }

    #[test]
    fn test_key_codes_round_trip_through_mapping() {
        for modifier in [
            Modifier::CapsLock,
            Modifier::Shift,
            Modifier::Control,
            Modifier::Option,
            Modifier::Command,
            Modifier::Function,
        ] {
            for key in modifier.key_codes() {
                assert_eq!(modifier_for(*key).map(|(m, _)| m), Some(modifier));
            }
        }
    }

    #[test]
    fn test_flags_contains() {
        let flags = ModifierFlags::EMPTY.with(Modifier::Shift).with(Modifier::Command);
        assert!(flags.contains(Modifier::Shift));
        assert!(flags.contains(Modifier::Command));
        assert!(!flags.contains(Modifier::Control));
        assert!(!flags.without(Modifier::Shift).contains(Modifier::Shift));
    }
}
