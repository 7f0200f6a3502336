use super::schemas::Config;
/// Configuration utilities - loading, validation, and access helpers
use crate::errors::{RelayError, RelayResult};
use crate::logger::{self, LogTag};
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::RwLock;

/// Global configuration instance
///
/// Set once at startup by `load_config`. Library code never reads it;
/// the relay receives its config explicitly.
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

/// Upper bound for relay.reconnect_delay_secs (one hour)
pub const MAX_RECONNECT_DELAY_SECS: u64 = 3600;

/// Parse a configuration file, falling back to defaults if it doesn't exist
pub fn read_config_file(path: &Path) -> RelayResult<Config> {
    if !path.exists() {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path.display()),
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)?;
    toml::from_str::<Config>(&contents).map_err(|e| {
        RelayError::Config(format!("Failed to parse '{}': {}", path.display(), e))
    })
}

/// Check values that serde can't
pub fn validate_config(config: &Config) -> RelayResult<()> {
    crate::relay::validate_endpoint(&config.relay.upstream_url)?;

    if config.relay.max_reconnect_attempts == 0 {
        return Err(RelayError::Config(
            "relay.max_reconnect_attempts must be at least 1".to_string(),
        ));
    }

    if config.relay.reconnect_delay_secs > MAX_RECONNECT_DELAY_SECS {
        return Err(RelayError::Config(format!(
            "relay.reconnect_delay_secs must be at most {}",
            MAX_RECONNECT_DELAY_SECS
        )));
    }

    if config.relay.connect_timeout_secs == 0 {
        return Err(RelayError::Config(
            "relay.connect_timeout_secs must be at least 1".to_string(),
        ));
    }

    if config.relay.observer_buffer_size == 0 {
        return Err(RelayError::Config(
            "relay.observer_buffer_size must be at least 1".to_string(),
        ));
    }

    if let Some(topic) = config
        .relay
        .topics
        .iter()
        .find(|t| t.name.trim().is_empty() || t.message_type.trim().is_empty())
    {
        return Err(RelayError::Config(format!(
            "relay.topics entry has an empty name or message_type: {:?}",
            topic
        )));
    }

    if config.webserver.heartbeat_secs == 0 {
        return Err(RelayError::Config(
            "webserver.heartbeat_secs must be at least 1".to_string(),
        ));
    }

    if config.webserver.client_idle_timeout_secs == 0 {
        return Err(RelayError::Config(
            "webserver.client_idle_timeout_secs must be at least 1".to_string(),
        ));
    }

    Ok(())
}

/// Apply --upstream / --host / --port overrides
pub fn apply_cli_overrides(config: &mut Config) -> RelayResult<()> {
    if let Some(url) = crate::arguments::get_upstream_override() {
        config.relay.upstream_url = url;
    }
    if let Some(host) = crate::arguments::get_host_override() {
        config.webserver.host = host;
    }
    if let Some(port) = crate::arguments::get_port_override().map_err(RelayError::Config)? {
        config.webserver.port = port;
    }
    if crate::arguments::is_manual_start_enabled() {
        config.relay.auto_start = false;
    }
    Ok(())
}

/// Load, override, validate and install the global configuration
pub fn load_config() -> RelayResult<()> {
    let path = crate::arguments::get_config_path_override()
        .unwrap_or_else(|| CONFIG_FILE_PATH.to_string());

    let mut config = read_config_file(Path::new(&path))?;
    apply_cli_overrides(&mut config)?;
    validate_config(&config)?;

    logger::info(
        LogTag::Config,
        &format!(
            "Configuration loaded (upstream={}, topics={}, listen={}:{})",
            config.relay.upstream_url,
            config.relay.topics.len(),
            config.webserver.host,
            config.webserver.port
        ),
    );

    CONFIG
        .set(RwLock::new(config))
        .map_err(|_| RelayError::Config("Config already initialized".to_string()))
}

/// Run a closure against the global configuration
///
/// Falls back to defaults if `load_config` was never called.
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    match CONFIG.get() {
        Some(lock) => match lock.read() {
            Ok(cfg) => f(&cfg),
            Err(poisoned) => f(&poisoned.into_inner()),
        },
        None => f(&Config::default()),
    }
}

/// Clone of the global configuration
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}
