//! Tracing and panic logging for applications built on eddy.
//!
//! The engine only emits `tracing` events; nothing is printed until a
//! subscriber is installed. [`install`] sets up a formatted console subscriber
//! filtered by `RUST_LOG`.

use std::panic::{self, PanicHookInfo};
use std::sync::Once;
use std::thread;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

const DEFAULT_FILTER: &str = "info";

// ============================================================================
// Global State
// ============================================================================

static PANIC_HOOK_INSTALLED: Once = Once::new();
static TRACING_INSTALLED: Once = Once::new();

// ============================================================================
// Installation
// ============================================================================

/// Installs the console subscriber and the panic logger (idempotent).
///
/// The filter comes from `RUST_LOG`, falling back to `info`. Use
/// `RUST_LOG=eddy_core=debug` to follow mounts, commits and unmounts.
pub fn install() {
    install_with_default(DEFAULT_FILTER);
}

/// Like [`install`], with a custom filter for when `RUST_LOG` is unset.
pub fn install_with_default(default_filter: &str) {
    TRACING_INSTALLED.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
        let console = fmt::layer().with_target(true).with_filter(filter);
        if tracing_subscriber::registry()
            .with(console)
            .try_init()
            .is_err()
        {
            eprintln!("eddy: a global tracing subscriber is already installed");
        }
    });
    install_panic_logger();
}

/// Logs panics through `tracing` before running the previous hook (idempotent).
pub fn install_panic_logger() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            log_panic(info);
            previous(info);
        }));
    });
}

fn log_panic(info: &PanicHookInfo<'_>) {
    let message = panic_message(info);
    let thread = thread::current().name().unwrap_or("unnamed").to_owned();
    let location = info
        .location()
        .map(|location| format!("{}:{}", location.file(), location.line()));
    tracing::error!(
        target: "eddy::panic",
        message = %message,
        thread = %thread,
        location = location.as_deref().unwrap_or("unknown"),
    );
}

fn panic_message(info: &PanicHookInfo<'_>) -> String {
    if let Some(message) = info.payload().downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = info.payload().downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown panic".to_owned()
    }
}
