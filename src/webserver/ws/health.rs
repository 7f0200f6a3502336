/// Observer socket health: heartbeat and timeouts
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Ping a client silent for this long
    pub heartbeat_interval: Duration,

    /// Drop a client with no activity for this long
    pub idle_timeout: Duration,

    /// Drop a client that doesn't answer a ping within this long
    pub pong_timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

impl HealthConfig {
    pub fn from_config(heartbeat_secs: u64, idle_timeout_secs: u64) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            idle_timeout: Duration::from_secs(idle_timeout_secs),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub struct ConnectionHealth {
    /// Last frame received from the client
    last_activity: Instant,

    /// Outstanding ping, if any
    last_ping: Option<Instant>,

    config: HealthConfig,
}

impl ConnectionHealth {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            last_activity: Instant::now(),
            last_ping: None,
            config,
        }
    }

    /// Any inbound frame counts; clears the outstanding ping
    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
        self.last_ping = None;
    }

    pub fn record_ping(&mut self) {
        self.last_ping = Some(Instant::now());
    }

    pub fn is_idle(&self) -> bool {
        self.last_activity.elapsed() > self.config.idle_timeout
    }

    pub fn is_pong_overdue(&self) -> bool {
        self.last_ping
            .map(|sent| sent.elapsed() > self.config.pong_timeout)
            .unwrap_or(false)
    }

    pub fn needs_ping(&self) -> bool {
        self.last_ping.is_none() && self.last_activity.elapsed() > self.config.heartbeat_interval
    }

    pub fn seconds_since_activity(&self) -> u64 {
        self.last_activity.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_heartbeat_then_pong_timeout() {
        tokio::time::pause();
        let mut health = ConnectionHealth::new(HealthConfig::from_config(30, 90));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!health.needs_ping());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(health.needs_ping());
        health.record_ping();
        assert!(!health.needs_ping());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(health.is_pong_overdue());
        assert!(!health.is_idle());

        health.record_activity();
        assert!(!health.is_pong_overdue());
        assert_eq!(health.seconds_since_activity(), 0);
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        tokio::time::pause();
        let health = ConnectionHealth::new(HealthConfig::default());

        tokio::time::advance(Duration::from_secs(91)).await;
        assert!(health.is_idle());
    }
}
