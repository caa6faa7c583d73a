//! keypress-listener: prints every accepted key press as a JSON line
//!
//! Starts the system listener, writes one line per press to stdout, and
//! stops cleanly on SIGINT/SIGTERM. Requires Accessibility / Input
//! Monitoring permission for the hosting terminal on macOS.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use keypress_listener::lifecycle::wait_for_shutdown;
use keypress_listener::{Config, KeyPressEvent, SystemListener};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "keypress-listener starting");

    let config = Config::load()?;
    info!(
        duplicate_window_ms = config.duplicate_window.as_millis() as u64,
        queue_capacity = config.queue_capacity,
        "configuration loaded"
    );

    // Listener callback -> main loop
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<KeyPressEvent>();
    let listener = SystemListener::new(&config, move |event| {
        let _ = event_tx.send(event);
    });

    if !listener.is_available() {
        warn!("keyboard monitoring is only available on macOS");
    } else if !listener.start_async().await {
        error!("failed to start listener - check Accessibility / Input Monitoring permissions");
    }

    tokio::select! {
        _ = async {
            while let Some(event) = event_rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!(?e, "failed to encode key press"),
                }
            }
        } => {
            info!("event stream closed");
        }

        result = wait_for_shutdown() => {
            match result {
                Ok(signal) => info!(%signal, "shutting down"),
                Err(e) => error!(?e, "failed to install signal handlers"),
            }
        }
    }

    if let Some(stats) = listener.stats() {
        info!(?stats, "session summary");
    }
    listener.stop();

    info!("keypress-listener stopped");
    Ok(())
}
