/// Shared application state passed to all route handlers
use crate::config::WebserverConfig;
use crate::relay::RelayService;
use crate::services::SharedServiceManager;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    /// The relay this server exposes
    pub relay: Arc<RelayService>,

    /// Webserver configuration
    pub config: Arc<WebserverConfig>,

    /// Open observer sockets
    pub ws_connections: Arc<RwLock<usize>>,

    /// Running services, for the health route
    pub services: SharedServiceManager,

    /// Server startup time
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        relay: Arc<RelayService>,
        config: WebserverConfig,
        services: SharedServiceManager,
    ) -> Self {
        Self {
            relay,
            config: Arc::new(config),
            ws_connections: Arc::new(RwLock::new(0)),
            services,
            startup_time: chrono::Utc::now(),
        }
    }

    pub async fn ws_connection_count(&self) -> usize {
        *self.ws_connections.read().await
    }

    pub async fn increment_ws_connections(&self) {
        let mut count = self.ws_connections.write().await;
        *count += 1;
    }

    pub async fn decrement_ws_connections(&self) {
        let mut count = self.ws_connections.write().await;
        if *count > 0 {
            *count -= 1;
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        (chrono::Utc::now() - self.startup_time)
            .num_seconds()
            .max(0) as u64
    }
}
