use crate::config::WebserverConfig;
use crate::logger::{self, LogTag};
use crate::relay::RelayService;
use crate::services::{Service, ServiceHealth, SharedServiceManager};
use crate::webserver::{self, AppState};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Observer websocket and admin API server
pub struct WebserverService {
    state: Arc<AppState>,
    server_shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl WebserverService {
    pub fn new(
        relay: Arc<RelayService>,
        config: WebserverConfig,
        services: SharedServiceManager,
    ) -> Self {
        Self {
            state: Arc::new(AppState::new(relay, config, services)),
            server_shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl Service for WebserverService {
    fn name(&self) -> &'static str {
        "webserver"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["relay"]
    }

    async fn start(&mut self, _shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
        // Bind before spawning so a taken port fails startup
        let listener = webserver::bind_listener(&self.state.config).await?;

        let state = self.state.clone();
        let server_shutdown = self.server_shutdown.clone();
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            if let Err(e) = webserver::serve(listener, state, server_shutdown).await {
                logger::error(LogTag::Webserver, &format!("Webserver failed: {}", e));
            }
            running.store(false, Ordering::SeqCst);
        });

        Ok(vec![handle])
    }

    async fn stop(&mut self) -> Result<(), String> {
        // notify_one keeps the permit if the server isn't waiting yet
        self.server_shutdown.notify_one();
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        if self.running.load(Ordering::SeqCst) {
            ServiceHealth::Healthy
        } else {
            ServiceHealth::Stopped
        }
    }
}
