//! Logging for the tdspu workspace
//!
//! Every crate logs through the macros below, which forward to `emit`.
//! The level is chosen once per process from the `TDSPU_LOG` variable:
//! - `TDSPU_LOG=off` (default) - no logs
//! - `TDSPU_LOG=info` - one line per discovered tree, group and written document
//! - `TDSPU_LOG=debug` - per-file extraction and matching details

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable holding the log level
pub const LOG_ENV: &str = "TDSPU_LOG";

static INIT: Once = Once::new();

/// Parsed value of `TDSPU_LOG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSetting {
    Off,
    Level(emit::Level),
    /// Unrecognised value; falls back to info
    Unknown,
}

/// Map a `TDSPU_LOG` value onto a setting.
pub fn parse_level(value: &str) -> LogSetting {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "off" | "none" => LogSetting::Off,
        "debug" => LogSetting::Level(emit::Level::Debug),
        "info" => LogSetting::Level(emit::Level::Info),
        "warn" => LogSetting::Level(emit::Level::Warn),
        "error" => LogSetting::Level(emit::Level::Error),
        _ => LogSetting::Unknown,
    }
}

/// Initialize diagnostics from the `TDSPU_LOG` environment variable.
///
/// Call once at startup; later calls are no-ops.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let raw = std::env::var(LOG_ENV).unwrap_or_default();
        let level = match parse_level(&raw) {
            LogSetting::Off => return,
            LogSetting::Level(level) => level,
            LogSetting::Unknown => {
                // Logging is not up yet, so this is the only place stderr is used directly.
                eprintln!("Warning: Unknown {LOG_ENV} value '{raw}', using 'info'");
                emit::Level::Info
            }
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        // The runtime has to outlive every emitting thread.
        std::mem::forget(rt);
    });
}

/// Log progress a user running the tool would want to see
/// (trees scanned, groups found, documents written).
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log per-file and per-group detail.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable problems: rejected files, skipped outputs.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that abort an output or the run.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

pub use init_diagnostics as init;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(""), LogSetting::Off);
        assert_eq!(parse_level("OFF"), LogSetting::Off);
        assert_eq!(parse_level("debug"), LogSetting::Level(emit::Level::Debug));
        assert_eq!(parse_level(" warn "), LogSetting::Level(emit::Level::Warn));
        assert_eq!(parse_level("chatty"), LogSetting::Unknown);
    }

    #[test]
    fn test_init_is_safe_to_call_multiple_times() {
        init_diagnostics();
        init_diagnostics();
    }

    #[test]
    fn test_macros_compile() {
        log_info!("Scanned {count} files", count: 3);
        log_debug!("Group {name}", name: "CMIP5_day_tas");
        log_warn!("Rejected file");
        log_error!("Write failed");
        info!("info");
        debug!("debug {value}", value: 42);
        warn!("warn");
        error!("error");
    }
}
