use crate::config_struct;

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration loaded from data/config.toml
    pub struct Config {
        /// Upstream connection and reconnect policy
        relay: RelayConfig = RelayConfig::default(),

        /// Downstream observer server
        webserver: WebserverConfig = WebserverConfig::default(),
    }
}

// ============================================================================
// RELAY CONFIGURATION
// ============================================================================

config_struct! {
    /// Upstream bus connection and reconnect policy
    pub struct RelayConfig {
        /// rosbridge websocket endpoint (reused unchanged on every reconnect)
        upstream_url: String = "ws://127.0.0.1:9090".to_string(),

        /// Fixed delay between a failure and the next connection attempt
        reconnect_delay_secs: u64 = 5,

        /// Consecutive reconnect attempts before giving up
        max_reconnect_attempts: u32 = 5,

        /// Give up on a single connection attempt after this long
        connect_timeout_secs: u64 = 10,

        /// Per-observer queue capacity; overflow drops the newest event
        observer_buffer_size: usize = 256,

        /// Connect as soon as the process starts
        auto_start: bool = true,

        /// Topics subscribed on every fresh connection
        topics: Vec<TopicConfig> = vec![TopicConfig::default()],
    }
}

config_struct! {
    /// One upstream topic subscription
    pub struct TopicConfig {
        name: String = "/talker".to_string(),
        message_type: String = "std_msgs/String".to_string(),
    }
}

// ============================================================================
// WEBSERVER CONFIGURATION
// ============================================================================

config_struct! {
    /// Downstream websocket/HTTP server
    pub struct WebserverConfig {
        host: String = "0.0.0.0".to_string(),
        port: u16 = 3002,

        /// Ping a silent client after this many seconds
        heartbeat_secs: u64 = 30,

        /// Drop a client with no activity for this long
        client_idle_timeout_secs: u64 = 90,
    }
}
