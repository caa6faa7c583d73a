//! Debounce and press-state tracking
//!
//! Turns the raw transition stream into single-fire presses:
//! - Regular keys: fire on down while Released, cleared on up
//! - Modifier keys: fire on the 0→1 edge of the key's flag bit
//! - Anything inside the duplicate window of the last accepted
//!   transition is dropped

mod machine;

pub use machine::{PressState, PressTracker, TrackerStats, DEFAULT_DUPLICATE_WINDOW};
