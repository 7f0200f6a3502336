use crate::logger::{self, LogTag};
use crate::relay::RelayService;
use crate::services::{Service, ServiceHealth};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// How often the relay summary is logged
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Runs the relay for the process lifetime
///
/// Connects at startup unless auto-start is off, logs a periodic summary,
/// and shuts the supervisor task down on stop.
pub struct RelayLifecycleService {
    relay: Arc<RelayService>,
    auto_start: bool,
}

impl RelayLifecycleService {
    pub fn new(relay: Arc<RelayService>, auto_start: bool) -> Self {
        Self { relay, auto_start }
    }
}

#[async_trait]
impl Service for RelayLifecycleService {
    fn name(&self) -> &'static str {
        "relay"
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
        if self.auto_start {
            self.relay.start().await.map_err(|e| e.to_string())?;
        } else {
            logger::info(
                LogTag::Relay,
                "Auto-start disabled, waiting for POST /api/relay/start",
            );
        }

        let relay = self.relay.clone();
        let handle = tokio::spawn(async move {
            let stopped = shutdown.notified();
            tokio::pin!(stopped);
            stopped.as_mut().enable();
            let mut ticker = tokio::time::interval(STATUS_LOG_INTERVAL);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        let status = relay.status().await;
                        logger::info(
                            LogTag::Relay,
                            &format!(
                                "Relay {} (retries={}/{}, observers={}, relayed={}, dropped={})",
                                status.state,
                                status.retry_count,
                                status.max_retries,
                                status.observers,
                                status.relay.messages_relayed,
                                status.hub.deliveries_dropped
                            ),
                        );
                    }
                }
            }
        });

        Ok(vec![handle])
    }

    async fn stop(&mut self) -> Result<(), String> {
        self.relay.shutdown().await;
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        let status = self.relay.status().await;
        ServiceHealth::from_relay_state(status.state, status.retry_count, status.max_retries)
    }
}
