//! keypress-listener: single-fire macOS keyboard press notifications
//!
//! Observes keyboard activity through two monitors (events for this
//! process while focused, and events system-wide) and turns the raw,
//! duplicated stream into exactly one callback per physical key press:
//! - Regular keys fire on key down, auto-repeat is suppressed until key up
//! - Modifier keys fire when their flag bit turns on
//! - The same event arriving through both monitors is collapsed
//!
//! ```no_run
//! use keypress_listener::{Config, SystemListener};
//!
//! let listener = SystemListener::new(&Config::default(), |event| {
//!     println!("{event}");
//! });
//! if !listener.start() {
//!     eprintln!("check Accessibility / Input Monitoring permissions");
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod keys;
pub mod lifecycle;
pub mod sink;
pub mod source;
pub mod tracker;

pub use config::Config;
pub use error::{ListenerError, Result};
pub use events::{KeyPressEvent, RawTransition, TransitionKind};
pub use keys::{KeyCode, Modifier, ModifierFlags, Side};
pub use lifecycle::{KeyPressListener, SystemListener};
pub use source::{EventSource, ManualController, ManualSource, MonitorKind, TransitionHandler};
pub use tracker::{PressState, PressTracker, TrackerStats};
