/// Broadcast hub - fans relay events out to every attached observer
///
/// Each observer owns a bounded queue. Publishing never waits on an
/// observer: a full queue drops the event for that observer only, and a
/// queue whose receiver is gone detaches the observer.
///
/// The observer set is guarded by one lock that publish holds for the whole
/// fan-out, so once `detach` returns no later event can reach that observer.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use super::metrics::HubMetrics;
use super::types::{ConnectionState, RelayEvent};
use crate::arguments::is_debug_hub_enabled;
use crate::logger::{self, LogTag};

// ============================================================================
// HUB TYPES
// ============================================================================

pub type ObserverId = u64;

/// Receiving end of an observer's queue
pub type ObserverReceiver = mpsc::Receiver<RelayEvent>;

/// Token returned by `attach`, consumed by `detach`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle {
    id: ObserverId,
}

impl ObserverHandle {
    pub fn id(&self) -> ObserverId {
        self.id
    }
}

/// Connectivity as last announced to observers
#[derive(Debug, Clone, PartialEq)]
enum Announced {
    Connected,
    Disconnected,
    Exhausted(String),
}

struct HubInner {
    observers: HashMap<ObserverId, mpsc::Sender<RelayEvent>>,
    announced: Announced,
}

impl HubInner {
    fn track(&mut self, event: &RelayEvent) {
        match event {
            RelayEvent::Connected { .. } => self.announced = Announced::Connected,
            RelayEvent::Disconnected { .. } | RelayEvent::Error { .. } => {
                self.announced = Announced::Disconnected
            }
            RelayEvent::RetriesExhausted { detail, .. } => {
                self.announced = Announced::Exhausted(detail.clone())
            }
            RelayEvent::Message { .. } => {}
        }
    }

    /// Follow a supervisor transition that has no event of its own
    ///
    /// `Connected` and `ExhaustedRetries` are announced by the events the
    /// supervisor publishes right after the transition, so only the states
    /// that mean "not connected, still trying or idle" are recorded here.
    fn follow(&mut self, state: ConnectionState) {
        match state {
            ConnectionState::Disconnected
            | ConnectionState::Connecting
            | ConnectionState::Error => self.announced = Announced::Disconnected,
            ConnectionState::Connected | ConnectionState::ExhaustedRetries => {}
        }
    }

    /// Synthetic event describing the current connectivity
    fn current_state_event(&self) -> RelayEvent {
        match &self.announced {
            Announced::Connected => RelayEvent::connected(),
            Announced::Disconnected => RelayEvent::disconnected(),
            Announced::Exhausted(detail) => RelayEvent::retries_exhausted(detail.clone()),
        }
    }
}

// ============================================================================
// BROADCAST HUB
// ============================================================================

pub struct BroadcastHub {
    inner: RwLock<HubInner>,
    next_id: AtomicU64,
    metrics: Arc<HubMetrics>,
    buffer_size: usize,
}

impl BroadcastHub {
    /// Create a hub whose observers each get a queue of `buffer_size` events
    pub fn new(buffer_size: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(HubInner {
                observers: HashMap::new(),
                announced: Announced::Disconnected,
            }),
            next_id: AtomicU64::new(1),
            metrics: HubMetrics::new(),
            buffer_size: buffer_size.max(1),
        })
    }

    /// Register an observer
    ///
    /// The returned queue already holds one synthetic event with the current
    /// connectivity, so late observers never start in an unknown state.
    pub async fn attach(&self) -> (ObserverHandle, ObserverReceiver) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(self.buffer_size);

        let mut inner = self.inner.write().await;
        // Fresh queue with capacity >= 1 cannot be full
        let _ = tx.try_send(inner.current_state_event());
        inner.observers.insert(id, tx);
        self.metrics.observer_attached();

        logger::debug(
            LogTag::Hub,
            &format!(
                "Observer {} attached (active={})",
                id,
                inner.observers.len()
            ),
        );

        (ObserverHandle { id }, rx)
    }

    /// Remove an observer; returns false if it was already gone
    pub async fn detach(&self, handle: ObserverHandle) -> bool {
        let mut inner = self.inner.write().await;
        let removed = inner.observers.remove(&handle.id).is_some();

        if removed {
            self.metrics.observer_detached();
            logger::debug(
                LogTag::Hub,
                &format!(
                    "Observer {} detached (active={})",
                    handle.id,
                    inner.observers.len()
                ),
            );
        }

        removed
    }

    /// Deliver `event` to every attached observer
    ///
    /// Returns the number of observers the event was queued for.
    pub async fn publish(&self, event: RelayEvent) -> usize {
        let mut inner = self.inner.write().await;
        inner.track(&event);
        self.metrics.event_published();

        if inner.observers.is_empty() {
            return 0;
        }

        let mut sent = 0;
        let mut dropped = 0;
        let mut gone = Vec::new();

        for (id, sender) in inner.observers.iter() {
            match sender.try_send(event.clone()) {
                Ok(()) => {
                    sent += 1;
                    self.metrics.delivered();
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    dropped += 1;
                    self.metrics.dropped();
                    logger::debug(
                        LogTag::Hub,
                        &format!("Event dropped for observer {} (queue full)", id),
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    gone.push(*id);
                }
            }
        }

        for id in &gone {
            inner.observers.remove(id);
            self.metrics.observer_pruned();
        }

        if is_debug_hub_enabled() {
            logger::debug(
                LogTag::Hub,
                &format!(
                    "Broadcast {} (sent={}, dropped={}, pruned={})",
                    event.status(),
                    sent,
                    dropped,
                    gone.len()
                ),
            );
        }

        sent
    }

    /// Keep the attach-time state in step with the supervisor
    pub async fn set_state(&self, state: ConnectionState) {
        self.inner.write().await.follow(state);
    }

    pub async fn observer_count(&self) -> usize {
        self.inner.read().await.observers.len()
    }

    pub fn metrics(&self) -> Arc<HubMetrics> {
        self.metrics.clone()
    }
}
