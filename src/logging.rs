//! Tracing subscriber setup for hosts that do not install their own.
//!
//! Library code only emits `tracing` events; nothing is printed until a
//! subscriber is installed. Hosts that already run a subscriber should skip
//! `init` entirely.

use crate::constants::{LOG_FORMAT_JSON, LOG_FORMAT_TEXT, TRACING_SERVICE_NAME};
use crate::errors::{AppError, AppResult};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Installs a global subscriber writing to stderr.
///
/// `format` is `"text"` or `"json"`. `level` is the default filter when
/// `RUST_LOG` is unset; hosts without a preference pass `DEFAULT_LOG_LEVEL`.
/// Calling this more than once is a no-op.
///
/// # Errors
///
/// Returns `AppError::Config` for an unknown format or level.
pub fn init(format: &str, level: &str) -> AppResult<()> {
    let level = level.trim().to_ascii_lowercase();
    if !VALID_LEVELS.contains(&level.as_str()) {
        return Err(AppError::Config(format!(
            "Invalid log level '{}', must be one of: {}",
            level,
            VALID_LEVELS.join(", ")
        )));
    }
    if format != LOG_FORMAT_TEXT && format != LOG_FORMAT_JSON {
        return Err(AppError::Config(format!(
            "Invalid log format '{}', must be '{}' or '{}'",
            format, LOG_FORMAT_TEXT, LOG_FORMAT_JSON
        )));
    }

    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    let registry = tracing_subscriber::registry().with(filter);

    // try_init fails when the host installed a subscriber first; keep theirs.
    let installed = if format == LOG_FORMAT_JSON {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    if installed.is_ok() {
        tracing::debug!(service = TRACING_SERVICE_NAME, format, "Logging initialized");
    }
    Ok(())
}
