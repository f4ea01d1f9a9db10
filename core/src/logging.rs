//! Logging setup for the verifier binary.

use std::io::IsTerminal;
use tracing::Level;

/// Install a stderr subscriber printing timestamp, level and message.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();
}
