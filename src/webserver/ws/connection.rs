/// Observer socket handler
///
/// One socket is one hub observer. The loop forwards relay events to the
/// client, answers `{"type":"ping"}`, and enforces heartbeat and idle
/// limits. The observer is detached when the loop ends for any reason.
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{
    health::{ConnectionHealth, HealthConfig},
    metrics::ConnectionMetrics,
};
use crate::{
    arguments::is_debug_webserver_enabled,
    logger::{self, LogTag},
    relay::RelayEvent,
    webserver::state::AppState,
};

/// Control frames a client may send
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlReply {
    Pong,
}

/// GET / and GET /ws
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let (handle, mut events) = state.relay.attach().await;
    let conn_id = handle.id();
    state.increment_ws_connections().await;

    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut health = ConnectionHealth::new(HealthConfig::from_config(
        state.config.heartbeat_secs,
        state.config.client_idle_timeout_secs,
    ));
    let metrics = ConnectionMetrics::new();
    let mut health_tick = tokio::time::interval(Duration::from_secs(1));

    logger::info(
        LogTag::Webserver,
        &format!("Observer {} connected", conn_id),
    );

    loop {
        tokio::select! {
            biased;

            event = events.recv() => {
                let Some(event) = event else {
                    // Hub dropped us
                    break;
                };
                if let Err(e) = forward_to_client(&mut ws_tx, &event, &metrics).await {
                    logger::warning(
                        LogTag::Webserver,
                        &format!("Observer {}: failed to send event: {}", conn_id, e),
                    );
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        health.record_activity();
                        metrics.inc_client_messages();
                        if let Err(e) = handle_client_message(&text, &mut ws_tx).await {
                            logger::warning(
                                LogTag::Webserver,
                                &format!("Observer {}: {}", conn_id, e),
                            );
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        if is_debug_webserver_enabled() {
                            logger::debug(
                                LogTag::Webserver,
                                &format!("Observer {}: client closed", conn_id),
                            );
                        }
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary, ping and pong frames all prove liveness
                        health.record_activity();
                    }
                    Some(Err(e)) => {
                        logger::warning(
                            LogTag::Webserver,
                            &format!("Observer {}: websocket error: {}", conn_id, e),
                        );
                        break;
                    }
                }
            }

            _ = health_tick.tick() => {
                if health.is_idle() {
                    logger::warning(
                        LogTag::Webserver,
                        &format!(
                            "Observer {}: idle timeout ({}s)",
                            conn_id,
                            health.seconds_since_activity()
                        ),
                    );
                    break;
                }

                if health.is_pong_overdue() {
                    logger::warning(
                        LogTag::Webserver,
                        &format!("Observer {}: pong timeout", conn_id),
                    );
                    break;
                }

                if health.needs_ping() {
                    if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                    health.record_ping();
                    metrics.inc_pings();
                }
            }
        }
    }

    state.relay.detach(handle).await;
    state.decrement_ws_connections().await;
    let _ = ws_tx.close().await;

    let snapshot = metrics.snapshot();
    logger::info(
        LogTag::Webserver,
        &format!(
            "Observer {} disconnected (sent={}, received={}, pings={})",
            conn_id, snapshot.events_sent, snapshot.client_messages, snapshot.pings_sent
        ),
    );
}

async fn forward_to_client(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    event: &RelayEvent,
    metrics: &ConnectionMetrics,
) -> Result<(), axum::Error> {
    match event.to_json() {
        Ok(json) => {
            ws_tx.send(Message::Text(json)).await?;
            metrics.inc_sent();
            Ok(())
        }
        Err(e) => {
            // Skip the event, keep the socket
            metrics.inc_encode_failures();
            logger::error(
                LogTag::Webserver,
                &format!("Failed to serialize relay event: {}", e),
            );
            Ok(())
        }
    }
}

/// Answer pings; anything else is ignored
async fn handle_client_message(
    text: &str,
    ws_tx: &mut SplitSink<WebSocket, Message>,
) -> Result<(), String> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => {
            let reply = serde_json::to_string(&ControlReply::Pong)
                .map_err(|e| format!("Serialization error: {}", e))?;
            ws_tx
                .send(Message::Text(reply))
                .await
                .map_err(|e| format!("Send error: {}", e))
        }
        Err(_) => {
            if is_debug_webserver_enabled() {
                logger::debug(
                    LogTag::Webserver,
                    &format!("Ignoring client message: {}", text),
                );
            }
            Ok(())
        }
    }
}
