//! Logging setup for docmap.
//!
//! docmap emits structured `tracing` events at record registration, record
//! construction, saves and every cursor open/read/release. Nothing is printed unless a
//! subscriber is installed, either by the application or by [`init`] when the
//! `tracing-subscriber` feature is enabled.
//!
//! # Environment Variables
//!
//! - `DOCMAP_DEBUG=true` (or `1`, `yes`) - Enable debug logging
//! - `DOCMAP_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific log level
//! - `DOCMAP_LOG_FORMAT=json|pretty|compact` - Output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use docmap::logging;
//!
//! // Call once at startup.
//! logging::init();
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

const DEBUG_VAR: &str = "DOCMAP_DEBUG";
const LEVEL_VAR: &str = "DOCMAP_LOG_LEVEL";
const FORMAT_VAR: &str = "DOCMAP_LOG_FORMAT";

/// Check if debug logging is enabled via `DOCMAP_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var(DEBUG_VAR)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// The log level from `DOCMAP_LOG_LEVEL`.
///
/// Falls back to "debug" when `DOCMAP_DEBUG` is on, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var(LEVEL_VAR) {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// The log format from `DOCMAP_LOG_FORMAT`. Defaults to "json".
pub fn get_log_format() -> &'static str {
    env::var(FORMAT_VAR)
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Install the docmap subscriber. Subsequent calls are no-ops.
///
/// Does nothing unless `DOCMAP_DEBUG` or `DOCMAP_LOG_LEVEL` is set, or when the
/// crate was built without the `tracing-subscriber` feature.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var(LEVEL_VAR).is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!(
                "docmap={level},docmap_mongodb={level}"
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let installed = match get_log_format() {
                "json" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .try_init(),
                "compact" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .try_init(),
                _ => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty())
                    .try_init(),
            };

            if installed.is_ok() {
                tracing::info!(
                    level = level,
                    format = get_log_format(),
                    "docmap logging initialized"
                );
            }
        }
    });
}

/// Initialize logging with a specific level.
///
/// # Safety
///
/// Modifies the process environment. Call it at startup, before other threads exist.
pub fn init_with_level(level: &str) {
    // SAFETY: documented as startup-only.
    unsafe {
        env::set_var(LEVEL_VAR, level);
    }
    init();
}

/// Equivalent to setting `DOCMAP_DEBUG=true` and calling [`init`].
///
/// # Safety
///
/// Modifies the process environment. Call it at startup, before other threads exist.
pub fn init_debug() {
    // SAFETY: documented as startup-only.
    unsafe {
        env::set_var(DEBUG_VAR, "true");
    }
    init();
}
