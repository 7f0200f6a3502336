use crate::relay::ConnectionState;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Service health status
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ServiceHealth {
    /// Operating normally
    Healthy,

    /// Running but not fully functional (e.g. reconnecting)
    Degraded(String),

    /// Failed; needs operator action
    Unhealthy(String),

    Starting,

    /// Not running (stopped on purpose)
    Stopped,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ServiceHealth::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ServiceHealth::Degraded(_))
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, ServiceHealth::Unhealthy(_))
    }

    /// Health of the relay given its connection state
    pub fn from_relay_state(state: ConnectionState, retry_count: u32, max_retries: u32) -> Self {
        match state {
            ConnectionState::Connected => ServiceHealth::Healthy,
            ConnectionState::Connecting if retry_count == 0 => ServiceHealth::Starting,
            ConnectionState::Connecting | ConnectionState::Error => ServiceHealth::Degraded(
                format!("reconnecting (attempt {}/{})", retry_count, max_retries),
            ),
            ConnectionState::ExhaustedRetries => {
                ServiceHealth::Unhealthy("upstream unreachable, retries exhausted".to_string())
            }
            ConnectionState::Disconnected => ServiceHealth::Stopped,
        }
    }
}

/// Overall process health: "ok", "degraded", "unhealthy" or "starting"
pub fn overall_status(health: &HashMap<&'static str, ServiceHealth>) -> &'static str {
    if health.is_empty() {
        "starting"
    } else if health.values().any(ServiceHealth::is_unhealthy) {
        "unhealthy"
    } else if health.values().all(ServiceHealth::is_healthy) {
        "ok"
    } else {
        "degraded"
    }
}

impl fmt::Display for ServiceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceHealth::Healthy => write!(f, "healthy"),
            ServiceHealth::Degraded(detail) => write!(f, "degraded: {}", detail),
            ServiceHealth::Unhealthy(detail) => write!(f, "unhealthy: {}", detail),
            ServiceHealth::Starting => write!(f, "starting"),
            ServiceHealth::Stopped => write!(f, "stopped"),
        }
    }
}
