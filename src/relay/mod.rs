//! Telemetry relay
//!
//! Keeps one connection to a rosbridge server alive and fans every message
//! on the subscribed topics out to any number of observers.
//!
//! ## Modules
//! - `types`: connection state, subscriptions, relay events and wire format
//! - `protocol`: rosbridge JSON frames and payload extraction
//! - `upstream`: the connection seam (`UpstreamConnector`) and `UpstreamLink`
//! - `subscriptions`: the topic set re-applied on every connection
//! - `hub`: per-observer bounded queues and fan-out
//! - `supervisor`: the state machine and reconnect timer
//! - `metrics`: counters for the status endpoint
//! - `service`: `RelayService`, the composition root
//!
//! ## Usage
//! ```ignore
//! let relay = RelayService::with_default_connector(&config.relay)?;
//! let (handle, mut events) = relay.attach().await;
//! relay.start().await?;
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.to_json()?);
//! }
//! ```

pub mod hub;
pub mod metrics;
pub mod protocol;
pub mod service;
pub mod subscriptions;
pub mod supervisor;
pub mod types;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testing;

pub use hub::{BroadcastHub, ObserverHandle, ObserverReceiver};
pub use service::{RelayService, RelayStatus};
pub use subscriptions::TopicSubscriptionSet;
pub use supervisor::ReconnectPolicy;
pub use types::{ConnectionState, ObserverMessage, RelayEvent, TopicSubscription};
pub use upstream::{TungsteniteConnector, UpstreamConnection, UpstreamConnector};

use crate::errors::{RelayError, RelayResult};

/// Check that `endpoint` is a ws:// or wss:// URL with a host
pub fn validate_endpoint(endpoint: &str) -> RelayResult<()> {
    let invalid = |reason: String| RelayError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = url::Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("ws://127.0.0.1:9090").is_ok());
        assert!(validate_endpoint("wss://robot.local/bridge").is_ok());

        for bad in ["http://127.0.0.1:9090", "127.0.0.1:9090", "ws://", ""] {
            assert!(
                matches!(validate_endpoint(bad), Err(RelayError::InvalidEndpoint { .. })),
                "{} should be rejected",
                bad
            );
        }
    }
}
