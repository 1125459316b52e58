//! Subscriber setup for engine diagnostics.
//!
//! The resolver and its adapters emit through `tracing`:
//!
//! - composed SQL (base loads, counts, collection windows, writes) at `debug`
//! - cache lookups and fills at `debug` and `trace`
//! - persistence permit acquisition at `trace`
//!
//! A host that already installs a subscriber needs nothing from this module.
//! Otherwise [`init`] wires one up from the environment:
//!
//! | variable           | effect                                            |
//! |--------------------|---------------------------------------------------|
//! | `WEAVE_DEBUG`      | `1`, `true` or `yes` turns on `debug` output      |
//! | `WEAVE_LOG_LEVEL`  | `trace`, `debug`, `info`, `warn` or `error`       |
//! | `WEAVE_LOG_FORMAT` | `json` (default), `pretty` or `compact`           |
//!
//! ```rust,no_run
//! weave_query::logging::init();
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Targets the installed filter enables, paired with what they emit.
pub const ENGINE_TARGETS: &[(&str, &str)] = &[
    ("weave_query::resolver", "base row and count SQL, cache lookups"),
    ("weave_query::relations", "collection window SQL"),
    ("weave_query::query", "compiled list queries"),
    ("weave_query::writer", "write statements and reference checks"),
    ("weave_query::cache", "cache fills"),
    ("weave_query::task_group", "permit acquisition"),
    ("weave_sqlite", "driver statements and transactions"),
];

/// Output encoding for [`init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line, human oriented.
    Pretty,
    /// Single line per event.
    Compact,
}

/// Whether `WEAVE_DEBUG` asks for debug output.
///
/// Also gates [`weave_debug!`](crate::weave_debug).
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("WEAVE_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Level applied to every engine target.
pub fn log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    let Ok(level) = env::var("WEAVE_LOG_LEVEL") else {
        return fallback;
    };
    ["trace", "debug", "info", "warn", "error"]
        .into_iter()
        .find(|known| level.eq_ignore_ascii_case(known))
        .unwrap_or(fallback)
}

/// Encoding chosen by `WEAVE_LOG_FORMAT`.
pub fn log_format() -> LogFormat {
    match env::var("WEAVE_LOG_FORMAT").map(|f| f.to_lowercase()).as_deref() {
        Ok("pretty") => LogFormat::Pretty,
        Ok("compact") => LogFormat::Compact,
        _ => LogFormat::Json,
    }
}

/// `EnvFilter` directives enabling `level` on each of [`ENGINE_TARGETS`].
pub fn filter_directives(level: &str) -> String {
    ENGINE_TARGETS
        .iter()
        .map(|(target, _)| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install a global subscriber once per process.
///
/// Does nothing unless `WEAVE_DEBUG` or `WEAVE_LOG_LEVEL` is set, or when
/// built without the `tracing-subscriber` feature.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("WEAVE_LOG_LEVEL").is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = log_level();
            let filter = EnvFilter::try_new(filter_directives(level))
                .unwrap_or_else(|_| EnvFilter::new("warn"));
            let registry = tracing_subscriber::registry().with(filter);
            let format = log_format();
            match format {
                LogFormat::Json => registry.with(fmt::layer().json()).init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
            }

            tracing::info!(level, format = ?format, "Engine diagnostics enabled");
        }
    });
}

/// `tracing::debug!` that only fires when `WEAVE_DEBUG` is set.
///
/// Per-batch cache lookups log through this.
#[macro_export]
macro_rules! weave_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}
