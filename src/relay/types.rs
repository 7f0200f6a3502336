/// Relay data model
///
/// - `ConnectionState`: the supervisor's single current state
/// - `TopicSubscription`: one upstream (topic, message kind) pair
/// - `RelayEvent`: what observers receive, stamped at emission time
/// - `ObserverMessage`: the JSON shape sent down to observers
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::TopicConfig;

// ============================================================================
// CONNECTION STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
    ExhaustedRetries,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
            ConnectionState::ExhaustedRetries => "exhausted_retries",
        }
    }

    /// True while the supervisor is connecting, connected, or waiting to retry
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Error
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TOPIC SUBSCRIPTION
// ============================================================================

/// Immutable (topic, message kind) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TopicSubscription {
    topic: String,
    message_kind: String,
}

impl TopicSubscription {
    pub fn new(topic: impl Into<String>, message_kind: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            message_kind: message_kind.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn message_kind(&self) -> &str {
        &self.message_kind
    }
}

impl From<&TopicConfig> for TopicSubscription {
    fn from(cfg: &TopicConfig) -> Self {
        Self::new(cfg.name.trim(), cfg.message_type.trim())
    }
}

impl fmt::Display for TopicSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.topic, self.message_kind)
    }
}

// ============================================================================
// RELAY EVENT
// ============================================================================

/// Event broadcast to every attached observer
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Connected {
        timestamp: DateTime<Utc>,
    },
    Disconnected {
        timestamp: DateTime<Utc>,
    },
    Error {
        detail: String,
        timestamp: DateTime<Utc>,
    },
    Message {
        topic: String,
        payload: String,
        timestamp: DateTime<Utc>,
    },
    RetriesExhausted {
        detail: String,
        timestamp: DateTime<Utc>,
    },
}

impl RelayEvent {
    pub fn connected() -> Self {
        RelayEvent::Connected {
            timestamp: Utc::now(),
        }
    }

    pub fn disconnected() -> Self {
        RelayEvent::Disconnected {
            timestamp: Utc::now(),
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        RelayEvent::Error {
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn message(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        RelayEvent::Message {
            topic: topic.into(),
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn retries_exhausted(detail: impl Into<String>) -> Self {
        RelayEvent::RetriesExhausted {
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            RelayEvent::Connected { timestamp }
            | RelayEvent::Disconnected { timestamp }
            | RelayEvent::Error { timestamp, .. }
            | RelayEvent::Message { timestamp, .. }
            | RelayEvent::RetriesExhausted { timestamp, .. } => *timestamp,
        }
    }

    /// Wire status code
    pub fn status(&self) -> &'static str {
        match self {
            RelayEvent::Connected { .. } => "connected",
            RelayEvent::Disconnected { .. } => "disconnected",
            RelayEvent::Error { .. } => "error",
            RelayEvent::Message { .. } => "message",
            RelayEvent::RetriesExhausted { .. } => "max_retries",
        }
    }

    pub fn to_observer_message(&self) -> ObserverMessage {
        let (message, error) = match self {
            RelayEvent::Message { payload, .. } => (Some(payload.clone()), None),
            RelayEvent::RetriesExhausted { detail, .. } => (Some(detail.clone()), None),
            RelayEvent::Error { detail, .. } => (None, Some(detail.clone())),
            RelayEvent::Connected { .. } | RelayEvent::Disconnected { .. } => (None, None),
        };

        ObserverMessage {
            status: self.status().to_string(),
            message,
            error,
            timestamp: format_timestamp(&self.timestamp()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_observer_message())
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// OBSERVER WIRE FORMAT
// ============================================================================

/// JSON object delivered to downstream observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverMessage {
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()
    }

    #[test]
    fn test_message_event_wire_format() {
        let event = RelayEvent::Message {
            topic: "/talker".to_string(),
            payload: "hello".to_string(),
            timestamp: fixed_time(),
        };

        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "message",
                "message": "hello",
                "timestamp": "2024-03-01T12:30:05.000Z",
            })
        );
    }

    #[test]
    fn test_error_event_carries_error_field_only() {
        let event = RelayEvent::Error {
            detail: "connection refused".to_string(),
            timestamp: fixed_time(),
        };
        let msg = event.to_observer_message();
        assert_eq!(msg.status, "error");
        assert_eq!(msg.error.as_deref(), Some("connection refused"));
        assert!(msg.message.is_none());
    }

    #[test]
    fn test_state_events_have_no_body() {
        let json = RelayEvent::Connected {
            timestamp: fixed_time(),
        }
        .to_json()
        .unwrap();
        assert_eq!(
            json,
            r#"{"status":"connected","timestamp":"2024-03-01T12:30:05.000Z"}"#
        );

        let msg = RelayEvent::Disconnected {
            timestamp: fixed_time(),
        }
        .to_observer_message();
        assert_eq!(msg.status, "disconnected");
        assert!(msg.message.is_none() && msg.error.is_none());
    }

    #[test]
    fn test_exhausted_uses_max_retries_status() {
        let msg = RelayEvent::retries_exhausted("gave up").to_observer_message();
        assert_eq!(msg.status, "max_retries");
        assert_eq!(msg.message.as_deref(), Some("gave up"));
        assert!(msg.error.is_none());
    }

    #[test]
    fn test_running_states() {
        assert!(!ConnectionState::Disconnected.is_running());
        assert!(ConnectionState::Connecting.is_running());
        assert!(ConnectionState::Error.is_running());
        assert!(!ConnectionState::ExhaustedRetries.is_running());
    }

    #[test]
    fn test_subscription_from_config_trims() {
        let cfg = TopicConfig {
            name: " /odom ".to_string(),
            message_type: "nav_msgs/Odometry".to_string(),
        };
        let sub = TopicSubscription::from(&cfg);
        assert_eq!(sub.topic(), "/odom");
        assert_eq!(sub.message_kind(), "nav_msgs/Odometry");
    }
}
