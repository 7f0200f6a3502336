/// RelayService - composition root for the relay
///
/// Wires UpstreamLink -> ReconnectSupervisor -> TopicSubscriptionSet ->
/// BroadcastHub and spawns the supervisor task. The service is an explicit
/// value shared by `Arc`; callers talk to the supervisor through commands.
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::hub::{BroadcastHub, ObserverHandle, ObserverReceiver};
use super::metrics::{HubMetricsSnapshot, RelayMetrics, RelayMetricsSnapshot};
use super::subscriptions::TopicSubscriptionSet;
use super::supervisor::{ReconnectPolicy, ReconnectSupervisor, SupervisorCommand, SupervisorStatus};
use super::types::{ConnectionState, TopicSubscription};
use super::upstream::{TungsteniteConnector, UpstreamConnector, UpstreamLink};
use super::validate_endpoint;
use crate::config::RelayConfig;
use crate::errors::{RelayError, RelayResult};
use crate::logger::{self, LogTag};

const COMMAND_QUEUE_SIZE: usize = 32;

/// Health snapshot for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    pub state: ConnectionState,
    pub retry_count: u32,
    pub max_retries: u32,
    pub endpoint: String,
    pub topics: Vec<TopicSubscription>,
    pub observers: usize,
    pub hub: HubMetricsSnapshot,
    pub relay: RelayMetricsSnapshot,
}

pub struct RelayService {
    endpoint: String,
    policy: ReconnectPolicy,
    subscriptions: TopicSubscriptionSet,
    hub: Arc<BroadcastHub>,
    metrics: Arc<RelayMetrics>,
    commands: mpsc::Sender<SupervisorCommand>,
    status_rx: watch::Receiver<SupervisorStatus>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl RelayService {
    /// Build the relay and spawn its supervisor task (must run inside a
    /// tokio runtime). The relay starts out `Disconnected`.
    pub fn new(
        config: &RelayConfig,
        connector: Arc<dyn UpstreamConnector>,
    ) -> RelayResult<Arc<Self>> {
        validate_endpoint(&config.upstream_url)?;

        let endpoint = config.upstream_url.clone();
        let policy = ReconnectPolicy::from_config(config);
        let subscriptions = TopicSubscriptionSet::from_config(&config.topics);
        let hub = BroadcastHub::new(config.observer_buffer_size);
        let metrics = RelayMetrics::new();

        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let (status_tx, status_rx) = watch::channel(SupervisorStatus::default());

        let supervisor = ReconnectSupervisor::new(
            endpoint.clone(),
            policy,
            subscriptions.clone(),
            UpstreamLink::new(connector, link_tx),
            hub.clone(),
            metrics.clone(),
            status_tx,
        );
        let task = tokio::spawn(supervisor.run(command_rx, link_rx));

        logger::info(
            LogTag::Relay,
            &format!(
                "Relay ready (upstream={}, topics={}, retry={}x{}s)",
                endpoint,
                subscriptions.len(),
                policy.max_attempts,
                policy.delay.as_secs()
            ),
        );

        Ok(Arc::new(Self {
            endpoint,
            policy,
            subscriptions,
            hub,
            metrics,
            commands: command_tx,
            status_rx,
            task: parking_lot::Mutex::new(Some(task)),
        }))
    }

    /// Relay over tokio-tungstenite
    pub fn with_default_connector(config: &RelayConfig) -> RelayResult<Arc<Self>> {
        let connector = TungsteniteConnector::new(Duration::from_secs(config.connect_timeout_secs));
        Self::new(config, Arc::new(connector))
    }

    /// Begin connecting; Ok(false) if a session was already running
    pub async fn start(&self) -> RelayResult<bool> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(SupervisorCommand::Start { ack })
            .await
            .map_err(|_| RelayError::ServiceStopped)?;
        done.await.map_err(|_| RelayError::ServiceStopped)
    }

    /// Close the upstream link without reconnecting
    pub async fn stop(&self) -> RelayResult<()> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(SupervisorCommand::Stop { ack })
            .await
            .map_err(|_| RelayError::ServiceStopped)?;
        done.await.map_err(|_| RelayError::ServiceStopped)
    }

    /// Stop the relay and end the supervisor task
    pub async fn shutdown(&self) {
        let _ = self.commands.send(SupervisorCommand::Shutdown).await;

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                logger::error(
                    LogTag::Relay,
                    &format!("Supervisor task ended abnormally: {}", e),
                );
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status_rx.borrow().state
    }

    pub fn retry_count(&self) -> u32 {
        self.status_rx.borrow().retry_count
    }

    /// Wait until the relay reaches `target`; false on timeout
    pub async fn wait_for_state(&self, target: ConnectionState, timeout: Duration) -> bool {
        let mut rx = self.status_rx.clone();
        let reached = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|s| s.state == target)).await,
            Ok(Ok(_))
        );
        reached
    }

    pub async fn attach(&self) -> (ObserverHandle, ObserverReceiver) {
        self.hub.attach().await
    }

    pub async fn detach(&self, handle: ObserverHandle) -> bool {
        self.hub.detach(handle).await
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn status(&self) -> RelayStatus {
        let current = *self.status_rx.borrow();
        RelayStatus {
            state: current.state,
            retry_count: current.retry_count,
            max_retries: self.policy.max_attempts,
            endpoint: self.endpoint.clone(),
            topics: self.subscriptions.iter().cloned().collect(),
            observers: self.hub.observer_count().await,
            hub: self.hub.metrics().snapshot(),
            relay: self.metrics.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopicConfig;
    use crate::relay::testing::ScriptedConnector;
    use crate::relay::types::RelayEvent;
    use crate::relay::upstream::LinkEvent;
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    const WAIT: Duration = Duration::from_secs(5);

    fn config(url: &str) -> RelayConfig {
        RelayConfig {
            upstream_url: url.to_string(),
            ..RelayConfig::default()
        }
    }

    #[tokio::test]
    async fn test_rejects_non_websocket_endpoint() {
        let result = RelayService::new(&config("http://bridge:9090"), ScriptedConnector::new());
        assert!(matches!(result, Err(RelayError::InvalidEndpoint { .. })));
    }

    #[tokio::test]
    async fn test_start_stop_through_handle() {
        let connector = ScriptedConnector::new();
        let relay = RelayService::new(&config("ws://bridge:9090"), connector.clone()).unwrap();
        assert_eq!(relay.state(), ConnectionState::Disconnected);

        assert!(relay.start().await.unwrap());
        assert!(!relay.start().await.unwrap());
        assert_eq!(relay.state(), ConnectionState::Connecting);

        connector.emit_latest(LinkEvent::Connected);
        assert!(relay.wait_for_state(ConnectionState::Connected, WAIT).await);

        let status = relay.status().await;
        assert_eq!(status.retry_count, 0);
        assert_eq!(status.max_retries, 5);
        assert_eq!(status.topics.len(), 1);
        assert_eq!(status.relay.successful_connections, 1);

        relay.stop().await.unwrap();
        assert_eq!(relay.state(), ConnectionState::Disconnected);
        assert!(connector.is_closed(connector.latest_generation()));

        relay.shutdown().await;
        assert!(matches!(relay.start().await, Err(RelayError::ServiceStopped)));
    }

    #[tokio::test]
    async fn test_relays_rosbridge_publish_to_all_observers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (subscribe_tx, subscribe_rx) = oneshot::channel::<serde_json::Value>();

        // Minimal rosbridge: wait for the subscribe, then publish once
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let frame = ws.next().await.unwrap().unwrap();
            let subscribe: serde_json::Value =
                serde_json::from_str(frame.to_text().unwrap()).unwrap();
            let _ = subscribe_tx.send(subscribe);

            ws.send(Message::Text(
                r#"{"op":"publish","topic":"/talker","msg":{"data":"hello"}}"#.to_string(),
            ))
            .await
            .unwrap();

            while let Some(Ok(_)) = ws.next().await {}
        });

        let mut cfg = config(&format!("ws://{}", addr));
        cfg.topics = vec![TopicConfig::default()];
        let relay = RelayService::with_default_connector(&cfg).unwrap();

        let (_a, mut first) = relay.attach().await;
        let (_b, mut second) = relay.attach().await;
        assert_eq!(first.recv().await.unwrap().status(), "disconnected");
        assert_eq!(second.recv().await.unwrap().status(), "disconnected");

        relay.start().await.unwrap();

        let subscribe = tokio::time::timeout(WAIT, subscribe_rx).await.unwrap().unwrap();
        assert_eq!(subscribe["op"], "subscribe");
        assert_eq!(subscribe["topic"], "/talker");
        assert_eq!(subscribe["type"], "std_msgs/String");

        let mut received = Vec::new();
        for rx in [&mut first, &mut second] {
            let connected = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            assert_eq!(connected.status(), "connected");
            let message = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            assert!(matches!(message, RelayEvent::Message { .. }));
            received.push(message.to_json().unwrap());
        }

        assert_eq!(received[0], received[1]);
        let json: serde_json::Value = serde_json::from_str(&received[0]).unwrap();
        assert_eq!(json["status"], "message");
        assert_eq!(json["message"], "hello");
        assert!(json.get("error").is_none());

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconnects_and_resubscribes_after_server_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (subscribe_tx, mut subscribe_rx) = mpsc::unbounded_channel::<serde_json::Value>();

        // First session closes right after the subscribe; the second publishes
        tokio::spawn(async move {
            for session in 0..2 {
                let (stream, _) = listener.accept().await.unwrap();
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

                let frame = ws.next().await.unwrap().unwrap();
                let subscribe: serde_json::Value =
                    serde_json::from_str(frame.to_text().unwrap()).unwrap();
                let _ = subscribe_tx.send(subscribe);

                if session == 0 {
                    ws.close(None).await.unwrap();
                    while let Some(Ok(_)) = ws.next().await {}
                    continue;
                }

                ws.send(Message::Text(
                    r#"{"op":"publish","topic":"/talker","msg":{"data":"again"}}"#.to_string(),
                ))
                .await
                .unwrap();
                while let Some(Ok(_)) = ws.next().await {}
            }
        });

        let mut cfg = config(&format!("ws://{}", addr));
        cfg.reconnect_delay_secs = 1;
        let relay = RelayService::with_default_connector(&cfg).unwrap();
        let (_h, mut rx) = relay.attach().await;
        assert_eq!(rx.recv().await.unwrap().status(), "disconnected");

        relay.start().await.unwrap();

        for _ in 0..2 {
            let subscribe = tokio::time::timeout(WAIT, subscribe_rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(subscribe["op"], "subscribe");
            assert_eq!(subscribe["topic"], "/talker");
        }

        let mut statuses = Vec::new();
        loop {
            let event = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            statuses.push(event.status());
            if let RelayEvent::Message { payload, .. } = &event {
                assert_eq!(payload, "again");
                break;
            }
        }
        assert_eq!(
            statuses,
            vec!["connected", "disconnected", "connected", "message"]
        );

        let status = relay.status().await;
        assert_eq!(status.state, ConnectionState::Connected);
        assert_eq!(status.retry_count, 0);
        assert_eq!(status.relay.successful_connections, 2);

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreachable_upstream_reports_error() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let mut cfg = config(&format!("ws://{}", addr));
        cfg.reconnect_delay_secs = 60;
        let relay = RelayService::with_default_connector(&cfg).unwrap();
        let (_h, mut rx) = relay.attach().await;
        rx.recv().await.unwrap();

        relay.start().await.unwrap();
        assert!(relay.wait_for_state(ConnectionState::Error, WAIT).await);
        assert_eq!(relay.retry_count(), 1);

        let event = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.status(), "error");
        assert!(event.to_observer_message().error.is_some());

        relay.shutdown().await;
    }
}
