/// Logger configuration derived from command-line flags
///
/// Recognized flags:
/// - `--debug-<tag>`: enable debug lines for one tag
/// - `--verbose-<tag>`: enable verbose lines for one tag
/// - `--verbose`: enable verbose lines for every tag
/// - `--quiet`: only warnings and errors
/// - `--log-tags <a,b>`: restrict output to the listed tags
/// - `--no-file-log`: console output only
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum level threshold (messages above it are dropped)
    pub min_level: LogLevel,

    /// Tags with debug output enabled
    pub debug_tags: HashSet<String>,

    /// Tags with verbose output enabled
    pub verbose_tags: HashSet<String>,

    /// If non-empty, only these tags are printed
    pub enabled_tags: HashSet<String>,

    /// Mirror console output into logs/
    pub file_logging: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            verbose_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
            file_logging: true,
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Snapshot of the current logger configuration
pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

/// Replace the logger configuration
pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

/// Build the logger configuration from the process arguments
pub fn init_from_args() {
    set_logger_config(config_from_args(&arguments::get_cmd_args()));
}

fn config_from_args(args: &[String]) -> LoggerConfig {
    let mut config = LoggerConfig::default();

    for (i, arg) in args.iter().enumerate() {
        if arg == "--verbose" {
            config.min_level = LogLevel::Verbose;
        } else if arg == "--quiet" {
            config.min_level = LogLevel::Warning;
        } else if arg == "--no-file-log" {
            config.file_logging = false;
        } else if arg == "--log-tags" {
            if let Some(list) = args.get(i + 1) {
                config.enabled_tags = list
                    .split(',')
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
        } else if let Some(tag) = arg.strip_prefix("--debug-") {
            config.debug_tags.insert(tag.to_lowercase());
            if config.min_level < LogLevel::Debug {
                config.min_level = LogLevel::Debug;
            }
        } else if let Some(tag) = arg.strip_prefix("--verbose-") {
            config.verbose_tags.insert(tag.to_lowercase());
            config.debug_tags.insert(tag.to_lowercase());
            config.min_level = LogLevel::Verbose;
        }
    }

    config
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    LOGGER_CONFIG
        .read()
        .debug_tags
        .contains(&tag.to_debug_key())
}

pub fn is_verbose_enabled_for_tag(tag: &LogTag) -> bool {
    LOGGER_CONFIG
        .read()
        .verbose_tags
        .contains(&tag.to_debug_key())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_debug_flags_collected() {
        let config = config_from_args(&args(&["rosrelay", "--debug-hub", "--debug-upstream"]));
        assert!(config.debug_tags.contains("hub"));
        assert!(config.debug_tags.contains("upstream"));
        assert_eq!(config.min_level, LogLevel::Debug);
    }

    #[test]
    fn test_quiet_and_tags() {
        let config = config_from_args(&args(&[
            "rosrelay",
            "--quiet",
            "--log-tags",
            "relay, hub",
            "--no-file-log",
        ]));
        assert_eq!(config.min_level, LogLevel::Warning);
        assert!(config.enabled_tags.contains("relay"));
        assert!(config.enabled_tags.contains("hub"));
        assert!(!config.file_logging);
    }
}
