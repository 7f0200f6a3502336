/// Centralized argument handling for rosrelay
///
/// Features:
/// - Centralized CMD_ARGS storage with thread-safe access
/// - Debug flag checking functions per module
/// - Override accessors for config values that can be set from the command line
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
/// Used by tests to override the default env::args() collection
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1).cloned())
}

// =============================================================================
// DEBUG FLAGS
// =============================================================================

pub fn is_debug_relay_enabled() -> bool {
    has_arg("--debug-relay")
}

pub fn is_debug_upstream_enabled() -> bool {
    has_arg("--debug-upstream")
}

pub fn is_debug_hub_enabled() -> bool {
    has_arg("--debug-hub")
}

pub fn is_debug_webserver_enabled() -> bool {
    has_arg("--debug-webserver")
}

// =============================================================================
// OVERRIDES
// =============================================================================

/// Path passed with --config
pub fn get_config_path_override() -> Option<String> {
    get_arg_value("--config")
}

/// Upstream URL passed with --upstream
pub fn get_upstream_override() -> Option<String> {
    get_arg_value("--upstream")
}

/// Webserver host passed with --host
pub fn get_host_override() -> Option<String> {
    get_arg_value("--host")
}

/// Webserver port passed with --port
pub fn get_port_override() -> Result<Option<u16>, String> {
    match get_arg_value("--port") {
        Some(raw) => raw
            .parse::<u16>()
            .map(Some)
            .map_err(|_| format!("Invalid --port value '{}': expected 1-65535", raw)),
        None => Ok(None),
    }
}

/// Relay waits for POST /api/relay/start instead of connecting at boot
pub fn is_manual_start_enabled() -> bool {
    has_arg("--manual-start")
}

pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

pub fn print_help() {
    println!("rosrelay - rosbridge telemetry relay\n");
    println!("Usage: rosrelay [OPTIONS]\n");
    println!("Options:");
    println!("  --config <path>      Config file (default: data/config.toml)");
    println!("  --upstream <url>     Override relay.upstream_url");
    println!("  --host <addr>        Override webserver.host");
    println!("  --port <n>           Override webserver.port");
    println!("  --manual-start       Do not connect upstream until started via API");
    println!("  --debug-<tag>        Debug logs for relay|upstream|hub|webserver|config|system");
    println!("  --verbose            Verbose logs for every tag");
    println!("  --quiet              Warnings and errors only");
    println!("  --no-file-log        Do not write logs/ files");
    println!("  -h, --help           Show this help");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_from_args() {
        let saved = get_cmd_args();

        set_cmd_args(
            ["rosrelay", "--port", "8080", "--upstream", "ws://robot:9090", "--manual-start"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        assert_eq!(get_port_override(), Ok(Some(8080)));
        assert_eq!(get_upstream_override().as_deref(), Some("ws://robot:9090"));
        assert_eq!(get_host_override(), None);
        assert!(is_manual_start_enabled());

        set_cmd_args(vec!["rosrelay".to_string(), "--port".to_string(), "http".to_string()]);
        assert!(get_port_override().is_err());

        set_cmd_args(saved);
    }
}
