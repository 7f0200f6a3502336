/// Reconnect supervisor - the single task that owns the connection state
///
/// Admin commands, upstream link signals and the retry timer are handled
/// strictly one at a time by `run`. Every transition is published to the
/// hub (as a relay event) and to a watch channel (as a status snapshot).
///
/// State machine:
/// - Disconnected --start--> Connecting
/// - Connecting --connected--> Connected (counter reset, subscriptions applied)
/// - Connecting|Connected --error|closed--> Error, retry scheduled
/// - Error --timer--> Connecting
/// - Error with counter at ceiling --> ExhaustedRetries (no more timers)
/// - any --stop--> Disconnected
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use super::hub::BroadcastHub;
use super::metrics::RelayMetrics;
use super::subscriptions::TopicSubscriptionSet;
use super::types::{ConnectionState, RelayEvent};
use super::upstream::{LinkEvent, LinkEventReceiver, LinkSignal, UpstreamLink};
use crate::arguments::is_debug_relay_enabled;
use crate::config::{RelayConfig, MAX_RECONNECT_DELAY_SECS};
use crate::logger::{self, LogTag};
use std::sync::Arc;

// ============================================================================
// POLICY & STATUS
// ============================================================================

/// Fixed-delay, bounded reconnect policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay is clamped so the retry deadline can always be computed
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            delay: Duration::from_secs(
                config.reconnect_delay_secs.min(MAX_RECONNECT_DELAY_SECS),
            ),
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

/// Snapshot published after every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorStatus {
    pub state: ConnectionState,
    pub retry_count: u32,
}

impl Default for SupervisorStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry_count: 0,
        }
    }
}

/// Requests from the service handle to the supervisor task
#[derive(Debug)]
pub enum SupervisorCommand {
    /// Ack carries false if a session was already running
    Start { ack: oneshot::Sender<bool> },
    Stop { ack: oneshot::Sender<()> },
    Shutdown,
}

// ============================================================================
// SUPERVISOR
// ============================================================================

pub struct ReconnectSupervisor {
    endpoint: String,
    policy: ReconnectPolicy,
    subscriptions: TopicSubscriptionSet,
    link: UpstreamLink,
    hub: Arc<BroadcastHub>,
    metrics: Arc<RelayMetrics>,
    status_tx: watch::Sender<SupervisorStatus>,
    state: ConnectionState,
    retry_count: u32,
    retry_deadline: Option<Instant>,
}

impl ReconnectSupervisor {
    pub fn new(
        endpoint: impl Into<String>,
        policy: ReconnectPolicy,
        subscriptions: TopicSubscriptionSet,
        link: UpstreamLink,
        hub: Arc<BroadcastHub>,
        metrics: Arc<RelayMetrics>,
        status_tx: watch::Sender<SupervisorStatus>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            policy,
            subscriptions,
            link,
            hub,
            metrics,
            status_tx,
            state: ConnectionState::Disconnected,
            retry_count: 0,
            retry_deadline: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_deadline.is_some()
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(SupervisorStatus {
            state: self.state,
            retry_count: self.retry_count,
        });
    }

    async fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            logger::debug(
                LogTag::Relay,
                &format!("State {} -> {}", self.state, next),
            );
        }
        self.state = next;
        self.hub.set_state(next).await;
        self.publish_status();
    }

    /// Begin a new session; returns false if one is already running
    pub async fn start(&mut self) -> bool {
        if self.state.is_running() {
            logger::info(
                LogTag::Relay,
                &format!("Relay already running (state={}), start ignored", self.state),
            );
            return false;
        }

        logger::info(
            LogTag::Relay,
            &format!("Starting relay session to {}", self.endpoint),
        );

        self.retry_count = 0;
        self.retry_deadline = None;
        self.connect().await;
        true
    }

    /// Tear down the link without scheduling a reconnect
    pub async fn stop(&mut self) {
        let previous = self.state;
        self.retry_deadline = None;
        self.link.close();
        self.transition(ConnectionState::Disconnected).await;

        if previous != ConnectionState::Disconnected {
            logger::info(LogTag::Relay, "Relay stopped");
            self.hub.publish(RelayEvent::disconnected()).await;
        }
    }

    async fn connect(&mut self) {
        self.metrics.connection_attempt();
        self.link.open(&self.endpoint);
        self.transition(ConnectionState::Connecting).await;
    }

    pub async fn handle_link_signal(&mut self, signal: LinkSignal) {
        if !self.link.is_current(&signal) {
            logger::debug(
                LogTag::Relay,
                &format!(
                    "Ignoring {:?} from stale connection #{} (current #{})",
                    signal.event,
                    signal.generation,
                    self.link.generation()
                ),
            );
            return;
        }

        match signal.event {
            LinkEvent::Connected => self.on_connected().await,
            LinkEvent::Error(detail) => {
                logger::warning(LogTag::Relay, &format!("Upstream error: {}", detail));
                self.on_failure(RelayEvent::error(detail)).await;
            }
            LinkEvent::Closed => {
                logger::warning(LogTag::Relay, "Upstream connection closed");
                self.on_failure(RelayEvent::disconnected()).await;
            }
            LinkEvent::Message { topic, payload } => {
                if self.state != ConnectionState::Connected {
                    return;
                }
                if is_debug_relay_enabled() {
                    logger::debug(
                        LogTag::Relay,
                        &format!("Relaying {} ({} bytes)", topic, payload.len()),
                    );
                }
                self.metrics.message_relayed();
                self.hub.publish(RelayEvent::message(topic, payload)).await;
            }
            LinkEvent::Malformed(detail) => {
                self.metrics.malformed_dropped();
                logger::warning(
                    LogTag::Relay,
                    &format!("Dropped malformed upstream message: {}", detail),
                );
            }
        }
    }

    async fn on_connected(&mut self) {
        if self.state != ConnectionState::Connecting {
            logger::warning(
                LogTag::Relay,
                &format!("Unexpected connect while {}, closing link", self.state),
            );
            self.link.close();
            return;
        }

        self.retry_count = 0;
        self.metrics.connection_succeeded();
        self.transition(ConnectionState::Connected).await;

        let applied = self.subscriptions.apply(&mut self.link);
        logger::info(
            LogTag::Relay,
            &format!(
                "Connected to {} ({}/{} topics subscribed)",
                self.endpoint,
                applied,
                self.subscriptions.len()
            ),
        );

        self.hub.publish(RelayEvent::connected()).await;
    }

    async fn on_failure(&mut self, event: RelayEvent) {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return;
        }

        self.link.close();
        self.transition(ConnectionState::Error).await;
        self.hub.publish(event).await;

        if self.retry_count < self.policy.max_attempts {
            self.retry_count += 1;
            self.retry_deadline = Some(Instant::now() + self.policy.delay);
            self.metrics.reconnect_attempt();
            self.publish_status();

            logger::info(
                LogTag::Relay,
                &format!(
                    "Reconnecting in {}s (attempt {}/{})",
                    self.policy.delay.as_secs(),
                    self.retry_count,
                    self.policy.max_attempts
                ),
            );
        } else {
            self.retry_deadline = None;
            self.metrics.retries_exhausted();
            self.transition(ConnectionState::ExhaustedRetries).await;

            let detail = format!(
                "Max reconnection attempts reached. \
                 Please check if the upstream bridge is running at {}",
                self.endpoint
            );
            logger::error(LogTag::Relay, &detail);
            self.hub.publish(RelayEvent::retries_exhausted(detail)).await;
        }
    }

    /// Fire the pending reconnect, if any
    pub async fn handle_retry_timer(&mut self) {
        if self.retry_deadline.take().is_none() {
            return;
        }
        if self.state != ConnectionState::Error {
            return;
        }

        logger::info(
            LogTag::Relay,
            &format!(
                "Reconnect attempt {}/{} to {}",
                self.retry_count, self.policy.max_attempts, self.endpoint
            ),
        );
        self.connect().await;
    }

    /// Process commands, link signals and the retry timer until shutdown
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SupervisorCommand>,
        mut link_events: LinkEventReceiver,
    ) {
        logger::debug(LogTag::Relay, "Supervisor task started");

        loop {
            let deadline = self.retry_deadline;

            tokio::select! {
                biased;

                command = commands.recv() => {
                    match command {
                        Some(SupervisorCommand::Start { ack }) => {
                            let started = self.start().await;
                            let _ = ack.send(started);
                        }
                        Some(SupervisorCommand::Stop { ack }) => {
                            self.stop().await;
                            let _ = ack.send(());
                        }
                        Some(SupervisorCommand::Shutdown) | None => {
                            self.stop().await;
                            break;
                        }
                    }
                }

                Some(signal) = link_events.recv() => {
                    self.handle_link_signal(signal).await;
                }

                _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                    self.handle_retry_timer().await;
                }
            }
        }

        logger::debug(LogTag::Relay, "Supervisor task stopped");
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
