//! Structured logging for flowwire
//!
//! Tag-based console logger with:
//! - Standard levels (Error/Warning/Info/Debug/Verbose)
//! - Per-subsystem debug output via `--debug-<tag>` flags
//! - Optional plain-text file mirror
//!
//! ```ignore
//! use flowwire::logger::{self, LogTag};
//!
//! logger::info(LogTag::Channel, "Connected");
//! logger::debug(LogTag::Telemetry, "Frame dropped by filter"); // only with --debug-telemetry
//! ```
//!
//! Call `logger::init()` once at startup before logging.

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{
    get_logger_config, init_from_args, set_logger_config, update_logger_config, LoggerConfig,
};
pub use levels::LogLevel;
pub use tags::LogTag;

use crate::config::LoggingConfig;

/// Initialize the logger from command-line flags and open the file mirror
pub fn init() {
    config::init_from_args();
    file::init_file_logging();
}

/// Merge the `[logging]` config section into the flag-derived settings
///
/// Flags win over the file: a level given on the command line is kept,
/// debug tags from both sources are combined.
pub fn apply_settings(settings: &LoggingConfig) {
    update_logger_config(|cfg| {
        if cfg.min_level == LogLevel::Info {
            if let Some(level) = LogLevel::parse(&settings.level) {
                cfg.min_level = level;
            }
        }
        cfg.debug_tags
            .extend(settings.debug_tags.iter().map(|t| t.to_lowercase()));
        if !settings.file.is_empty() {
            cfg.file_path = Some(settings.file.clone().into());
        }
        cfg.use_colors = cfg.use_colors && settings.colors;
    });
    file::init_file_logging();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level, shown only with `--debug-<tag>`
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level, shown only with `--verbose`
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Force flush pending file writes (call during shutdown)
pub fn flush() {
    file::flush_file_logging();
}
