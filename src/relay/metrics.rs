use serde::Serialize;
/// Relay counters for the status endpoint
///
/// - `HubMetrics`: observer lifecycle and delivery outcomes
/// - `RelayMetrics`: upstream connection attempts and message flow
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// HUB METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Observers attached (lifetime)
    total_observers: AtomicU64,

    /// Currently attached observers
    active_observers: AtomicUsize,

    /// Events handed to publish()
    events_published: AtomicU64,

    /// Events queued to an observer
    deliveries: AtomicU64,

    /// Events dropped because an observer queue was full
    deliveries_dropped: AtomicU64,

    /// Observers removed because their receiver was gone
    observers_pruned: AtomicU64,
}

impl HubMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn observer_attached(&self) {
        self.total_observers.fetch_add(1, Ordering::Relaxed);
        self.active_observers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observer_detached(&self) {
        self.active_observers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn observer_pruned(&self) {
        self.observers_pruned.fetch_add(1, Ordering::Relaxed);
        self.observer_detached();
    }

    pub fn event_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) {
        self.deliveries_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HubMetricsSnapshot {
        HubMetricsSnapshot {
            total_observers: self.total_observers.load(Ordering::Relaxed),
            active_observers: self.active_observers.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            deliveries_dropped: self.deliveries_dropped.load(Ordering::Relaxed),
            observers_pruned: self.observers_pruned.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubMetricsSnapshot {
    pub total_observers: u64,
    pub active_observers: usize,
    pub events_published: u64,
    pub deliveries: u64,
    pub deliveries_dropped: u64,
    pub observers_pruned: u64,
}

// ============================================================================
// RELAY METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct RelayMetrics {
    connection_attempts: AtomicU64,
    successful_connections: AtomicU64,
    reconnect_attempts: AtomicU64,
    messages_relayed: AtomicU64,
    malformed_dropped: AtomicU64,
    retries_exhausted: AtomicU64,
}

impl RelayMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connection_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_succeeded(&self) {
        self.successful_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_relayed(&self) {
        self.messages_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn malformed_dropped(&self) {
        self.malformed_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retries_exhausted(&self) {
        self.retries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelayMetricsSnapshot {
        RelayMetricsSnapshot {
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            successful_connections: self.successful_connections.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            malformed_dropped: self.malformed_dropped.load(Ordering::Relaxed),
            retries_exhausted: self.retries_exhausted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayMetricsSnapshot {
    pub connection_attempts: u64,
    pub successful_connections: u64,
    pub reconnect_attempts: u64,
    pub messages_relayed: u64,
    pub malformed_dropped: u64,
    pub retries_exhausted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_metrics() {
        let metrics = HubMetrics::new();

        metrics.observer_attached();
        metrics.observer_attached();
        metrics.event_published();
        metrics.delivered();
        metrics.delivered();
        metrics.dropped();
        metrics.observer_pruned();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_observers, 2);
        assert_eq!(snapshot.active_observers, 1);
        assert_eq!(snapshot.events_published, 1);
        assert_eq!(snapshot.deliveries, 2);
        assert_eq!(snapshot.deliveries_dropped, 1);
        assert_eq!(snapshot.observers_pruned, 1);
    }

    #[test]
    fn test_relay_metrics() {
        let metrics = RelayMetrics::new();
        metrics.connection_attempt();
        metrics.reconnect_attempt();
        metrics.message_relayed();
        metrics.malformed_dropped();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connection_attempts, 1);
        assert_eq!(snapshot.reconnect_attempts, 1);
        assert_eq!(snapshot.messages_relayed, 1);
        assert_eq!(snapshot.malformed_dropped, 1);
        assert_eq!(snapshot.successful_connections, 0);
    }
}
