//! In-memory upstream connector for tests
//!
//! Records every `open()` and lets the test play the rosbridge server by
//! emitting link events for a chosen connection generation.
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::types::TopicSubscription;
use super::upstream::{
    Generation, LinkEvent, LinkEventSender, LinkSignal, UpstreamConnection, UpstreamConnector,
};
use crate::errors::RelayResult;

struct OpenRecord {
    endpoint: String,
    generation: Generation,
    events: LinkEventSender,
    subscriptions: Arc<Mutex<Vec<TopicSubscription>>>,
    closed: Arc<AtomicBool>,
}

#[derive(Default)]
pub struct ScriptedConnector {
    opens: Mutex<Vec<OpenRecord>>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().len()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.opens.lock().iter().map(|o| o.endpoint.clone()).collect()
    }

    /// Generation of the most recent open
    pub fn latest_generation(&self) -> Generation {
        self.opens
            .lock()
            .last()
            .map(|o| o.generation)
            .unwrap_or_default()
    }

    /// Play an event for a connection instance, as the transport would
    pub fn emit(&self, generation: Generation, event: LinkEvent) {
        let opens = self.opens.lock();
        if let Some(record) = opens.iter().find(|o| o.generation == generation) {
            let _ = record.events.send(LinkSignal { generation, event });
        }
    }

    /// Emit on the most recent connection instance
    pub fn emit_latest(&self, event: LinkEvent) {
        self.emit(self.latest_generation(), event);
    }

    pub fn subscriptions(&self, generation: Generation) -> Vec<TopicSubscription> {
        self.opens
            .lock()
            .iter()
            .find(|o| o.generation == generation)
            .map(|o| o.subscriptions.lock().clone())
            .unwrap_or_default()
    }

    pub fn is_closed(&self, generation: Generation) -> bool {
        self.opens
            .lock()
            .iter()
            .find(|o| o.generation == generation)
            .map(|o| o.closed.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

impl UpstreamConnector for ScriptedConnector {
    fn open(
        &self,
        endpoint: &str,
        generation: Generation,
        events: LinkEventSender,
    ) -> Box<dyn UpstreamConnection> {
        let subscriptions = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));

        self.opens.lock().push(OpenRecord {
            endpoint: endpoint.to_string(),
            generation,
            events,
            subscriptions: subscriptions.clone(),
            closed: closed.clone(),
        });

        Box::new(ScriptedConnection {
            subscriptions,
            closed,
            seen: HashSet::new(),
        })
    }
}

struct ScriptedConnection {
    subscriptions: Arc<Mutex<Vec<TopicSubscription>>>,
    closed: Arc<AtomicBool>,
    seen: HashSet<String>,
}

impl UpstreamConnection for ScriptedConnection {
    fn subscribe(&mut self, subscription: &TopicSubscription) -> RelayResult<()> {
        if self.seen.insert(subscription.topic().to_string()) {
            self.subscriptions.lock().push(subscription.clone());
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
