/// Per-socket counters, logged when the socket closes
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    /// Relay events written to the socket
    events_sent: AtomicU64,

    /// Events that failed to serialize
    encode_failures: AtomicU64,

    /// Text frames received from the client
    client_messages: AtomicU64,

    /// Heartbeat pings sent
    pings_sent: AtomicU64,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_sent(&self) {
        self.events_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_encode_failures(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_client_messages(&self) {
        self.client_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_pings(&self) {
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConnectionMetricsSnapshot {
        ConnectionMetricsSnapshot {
            events_sent: self.events_sent.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            client_messages: self.client_messages.load(Ordering::Relaxed),
            pings_sent: self.pings_sent.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionMetricsSnapshot {
    pub events_sent: u64,
    pub encode_failures: u64,
    pub client_messages: u64,
    pub pings_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_metrics() {
        let metrics = ConnectionMetrics::new();
        metrics.inc_sent();
        metrics.inc_sent();
        metrics.inc_client_messages();
        metrics.inc_pings();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_sent, 2);
        assert_eq!(snapshot.client_messages, 1);
        assert_eq!(snapshot.pings_sent, 1);
        assert_eq!(snapshot.encode_failures, 0);
    }
}
