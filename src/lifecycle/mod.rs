//! Listener lifecycle
//!
//! Provides the Idle/Listening controller, its platform facade, and
//! shutdown signal handling for the binary.

mod controller;
#[cfg(unix)]
mod shutdown;
mod system;

pub use controller::KeyPressListener;
#[cfg(unix)]
pub use shutdown::{wait_for_shutdown, Shutdown};
pub use system::SystemListener;
