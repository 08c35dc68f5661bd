//! Structured diagnostics on stderr via `tracing-subscriber`.
//!
//! Filter precedence: `HARDHAT_PANEL_LOG`, then `RUST_LOG`, then the caller's default
//! (`warn`, or `debug` with `--verbose`). Stdout is never written to, so JSON responses
//! stay machine-readable.
use std::env;

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<()> = OnceCell::new();

pub const LOG_ENV: &str = "HARDHAT_PANEL_LOG";

fn filter_directive(default_level: &str) -> String {
    [LOG_ENV, "RUST_LOG"]
        .iter()
        .filter_map(|k| env::var(k).ok())
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| default_level.to_string())
}

/// Install the global subscriber once; later calls are no-ops.
pub fn init(verbose: bool) {
    if INIT.get().is_some() {
        return;
    }
    let default_level = if verbose { "debug" } else { "warn" };
    let directive = filter_directive(default_level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("hardhat-panel: ignoring invalid log filter {directive:?}: {e}");
        EnvFilter::new(default_level)
    });
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(crate::color::color_enabled_stderr())
        .with_target(false)
        .try_init();
    if result.is_err() {
        eprintln!("hardhat-panel: logging init skipped (global subscriber already set)");
    }
    let _ = INIT.set(());
}
