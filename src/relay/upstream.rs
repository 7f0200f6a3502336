/// Upstream link - owns the single connection to the rosbridge server
///
/// Connection callbacks are modeled as `LinkSignal`s pushed into a channel
/// that the supervisor consumes. Every `open()` creates a fresh connection
/// instance tagged with a new generation number; signals from any other
/// generation are stale and must be ignored by the consumer.
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::protocol::{self, InboundFrame};
use super::types::TopicSubscription;
use crate::arguments::is_debug_upstream_enabled;
use crate::errors::{RelayError, RelayResult};
use crate::logger::{self, LogTag};

// ============================================================================
// LINK EVENTS
// ============================================================================

/// Connection instance number, incremented on every `open()`
pub type Generation = u64;

/// What a connection instance reports
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Connected,
    Error(String),
    Closed,
    Message { topic: String, payload: String },
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkSignal {
    pub generation: Generation,
    pub event: LinkEvent,
}

pub type LinkEventSender = mpsc::UnboundedSender<LinkSignal>;
pub type LinkEventReceiver = mpsc::UnboundedReceiver<LinkSignal>;

// ============================================================================
// CONNECTOR SEAM
// ============================================================================

/// Factory for upstream connection instances
///
/// `open` must not block: the connection result arrives later as a
/// `LinkEvent::Connected` or `LinkEvent::Error`. Each instance reports at
/// most one terminal event (`Error` or `Closed`).
pub trait UpstreamConnector: Send + Sync {
    fn open(
        &self,
        endpoint: &str,
        generation: Generation,
        events: LinkEventSender,
    ) -> Box<dyn UpstreamConnection>;
}

/// One live (or opening) connection instance
pub trait UpstreamConnection: Send {
    /// Route `subscription.topic()` to the event channel; repeated calls for
    /// the same topic on the same instance are no-ops
    fn subscribe(&mut self, subscription: &TopicSubscription) -> RelayResult<()>;

    /// Release the connection; no further events are sent for this instance
    fn close(&mut self);
}

// ============================================================================
// UPSTREAM LINK
// ============================================================================

pub struct UpstreamLink {
    connector: Arc<dyn UpstreamConnector>,
    events: LinkEventSender,
    generation: Generation,
    current: Option<Box<dyn UpstreamConnection>>,
}

impl UpstreamLink {
    pub fn new(connector: Arc<dyn UpstreamConnector>, events: LinkEventSender) -> Self {
        Self {
            connector,
            events,
            generation: 0,
            current: None,
        }
    }

    /// Begin opening a fresh connection, discarding any previous one
    pub fn open(&mut self, endpoint: &str) -> Generation {
        self.close();
        self.generation += 1;

        logger::debug(
            LogTag::Upstream,
            &format!("Opening connection #{} to {}", self.generation, endpoint),
        );

        self.current = Some(
            self.connector
                .open(endpoint, self.generation, self.events.clone()),
        );
        self.generation
    }

    /// Release the current connection (no-op if none)
    pub fn close(&mut self) {
        if let Some(mut connection) = self.current.take() {
            connection.close();
            logger::debug(
                LogTag::Upstream,
                &format!("Closed connection #{}", self.generation),
            );
        }
    }

    pub fn subscribe(&mut self, subscription: &TopicSubscription) -> RelayResult<()> {
        match self.current.as_mut() {
            Some(connection) => connection.subscribe(subscription),
            None => Err(RelayError::ConnectionClosed),
        }
    }

    /// True if the signal belongs to the open connection instance
    pub fn is_current(&self, signal: &LinkSignal) -> bool {
        self.current.is_some() && signal.generation == self.generation
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

impl Drop for UpstreamLink {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// TUNGSTENITE CONNECTOR
// ============================================================================

/// rosbridge connector over tokio-tungstenite
pub struct TungsteniteConnector {
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl UpstreamConnector for TungsteniteConnector {
    fn open(
        &self,
        endpoint: &str,
        generation: Generation,
        events: LinkEventSender,
    ) -> Box<dyn UpstreamConnection> {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(
            endpoint.to_string(),
            generation,
            events,
            command_rx,
            self.connect_timeout,
        ));

        Box::new(TungsteniteConnection { commands, task })
    }
}

enum ConnectionCommand {
    Subscribe(TopicSubscription),
}

struct TungsteniteConnection {
    commands: mpsc::UnboundedSender<ConnectionCommand>,
    task: JoinHandle<()>,
}

impl UpstreamConnection for TungsteniteConnection {
    fn subscribe(&mut self, subscription: &TopicSubscription) -> RelayResult<()> {
        self.commands
            .send(ConnectionCommand::Subscribe(subscription.clone()))
            .map_err(|_| RelayError::ConnectionClosed)
    }

    fn close(&mut self) {
        self.task.abort();
    }
}

impl Drop for TungsteniteConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Connection task: connect, then pump subscribe commands out and frames in
async fn run_connection(
    endpoint: String,
    generation: Generation,
    events: LinkEventSender,
    mut commands: mpsc::UnboundedReceiver<ConnectionCommand>,
    connect_timeout: Duration,
) {
    let emit = |event: LinkEvent| {
        // Receiver gone means the relay shut down
        let _ = events.send(LinkSignal { generation, event });
    };

    let stream = match tokio::time::timeout(connect_timeout, connect_async(endpoint.as_str())).await
    {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            emit(LinkEvent::Error(format!("Failed to connect to {}: {}", endpoint, e)));
            return;
        }
        Err(_) => {
            emit(LinkEvent::Error(format!(
                "Connection to {} timed out after {}s",
                endpoint,
                connect_timeout.as_secs()
            )));
            return;
        }
    };

    emit(LinkEvent::Connected);

    let (mut sink, mut source) = stream.split();

    // topic -> message kind, for this connection instance only
    let mut routes: HashMap<String, String> = HashMap::new();
    let mut next_seq: u64 = 1;

    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(ConnectionCommand::Subscribe(subscription)) => {
                        if routes.contains_key(subscription.topic()) {
                            logger::debug(
                                LogTag::Upstream,
                                &format!(
                                    "Already subscribed to {} on #{}",
                                    subscription.topic(),
                                    generation
                                ),
                            );
                            continue;
                        }

                        let frame = match protocol::subscribe_frame(&subscription, next_seq) {
                            Ok(frame) => frame,
                            Err(e) => {
                                emit(LinkEvent::Malformed(format!(
                                    "Failed to encode subscription for {}: {}",
                                    subscription.topic(),
                                    e
                                )));
                                continue;
                            }
                        };
                        next_seq += 1;

                        if let Err(e) = sink.send(Message::Text(frame)).await {
                            emit(LinkEvent::Error(format!(
                                "Failed to send subscription for {}: {}",
                                subscription.topic(),
                                e
                            )));
                            return;
                        }

                        routes.insert(
                            subscription.topic().to_string(),
                            subscription.message_kind().to_string(),
                        );
                    }
                    None => {
                        // Link dropped this instance
                        let _ = sink.close().await;
                        return;
                    }
                }
            }

            frame = source.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if is_debug_upstream_enabled() {
                            logger::debug(
                                LogTag::Upstream,
                                &format!("#{} frame ({} bytes)", generation, text.len()),
                            );
                            logger::verbose(
                                LogTag::Upstream,
                                &format!("#{} frame: {}", generation, text),
                            );
                        }
                        if let Some(event) = decode_text_frame(&text, &routes) {
                            emit(event);
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        emit(LinkEvent::Malformed(format!(
                            "Unexpected binary frame ({} bytes)",
                            bytes.len()
                        )));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        logger::debug(
                            LogTag::Upstream,
                            &format!("#{} closed by server: {:?}", generation, frame),
                        );
                        emit(LinkEvent::Closed);
                        return;
                    }
                    Some(Ok(_)) => {
                        // Ping/pong are answered by tungstenite
                    }
                    Some(Err(e)) => {
                        emit(LinkEvent::Error(format!("Upstream connection error: {}", e)));
                        return;
                    }
                    None => {
                        emit(LinkEvent::Closed);
                        return;
                    }
                }
            }
        }
    }
}

/// Decode a text frame into the event it produces, if any
fn decode_text_frame(text: &str, routes: &HashMap<String, String>) -> Option<LinkEvent> {
    let frame = match protocol::parse_frame(text) {
        Ok(frame) => frame,
        Err(e) => return Some(LinkEvent::Malformed(e.to_string())),
    };

    match frame {
        InboundFrame::Publish { topic, msg } => {
            let kind = match routes.get(&topic) {
                Some(kind) => kind,
                None => {
                    logger::debug(
                        LogTag::Upstream,
                        &format!("Ignoring publish on unsubscribed topic {}", topic),
                    );
                    return None;
                }
            };

            match protocol::extract_payload(kind, &msg) {
                Ok(payload) => Some(LinkEvent::Message { topic, payload }),
                Err(e) => Some(LinkEvent::Malformed(format!("{} on {}", e, topic))),
            }
        }
        InboundFrame::Status { level, text } => {
            logger::warning(
                LogTag::Upstream,
                &format!("rosbridge status [{}]: {}", level, text),
            );
            None
        }
        InboundFrame::Ignored { op } => {
            logger::debug(LogTag::Upstream, &format!("Ignoring rosbridge op '{}'", op));
            None
        }
    }
}
