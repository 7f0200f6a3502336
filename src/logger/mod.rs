//! Structured logging system for rosrelay
//!
//! This module provides a small, ergonomic logging API with:
//! - Automatic debug mode filtering from command-line arguments
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-module debug control via --debug-<module> flags
//! - Dual output: colored console + file persistence
//!
//! ## Usage
//!
//! ```no_run
//! use rosrelay::logger::{self, LogTag};
//!
//! logger::error(LogTag::Upstream, "Connection failed");
//! logger::warning(LogTag::Hub, "Observer queue full");
//! logger::info(LogTag::Relay, "Relay started");
//! logger::debug(LogTag::Upstream, "Raw frame: ..."); // Only if --debug-upstream
//! logger::verbose(LogTag::Hub, "Delivery details: ..."); // Only if --verbose
//! ```
//!
//! ## Initialization
//!
//! Call once at startup (in main.rs):
//! ```no_run
//! rosrelay::logger::init();
//! ```

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, init_from_args, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// This must be called once at application startup, before any logging occurs.
/// It parses debug flags from the command line and opens the log file.
pub fn init() {
    config::init_from_args();

    if get_logger_config().file_logging {
        file::init_file_logging();
    }
}

/// Log at ERROR level (always shown, critical issues)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (important issues)
///
/// Warnings are shown by default, including under --quiet.
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (detailed diagnostics)
///
/// Debug logs are ONLY shown when the --debug-<module> flag for the tag is provided.
///
/// # Example
/// ```no_run
/// use rosrelay::logger::{self, LogTag};
///
/// // Only shown with --debug-hub flag
/// logger::debug(LogTag::Hub, "observer 3 attached");
/// ```
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (very detailed tracing)
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Force flush all pending log writes
///
/// Call this during shutdown to ensure all logs are written to disk.
pub fn flush() {
    file::flush_file_logging();
}
