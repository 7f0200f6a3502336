/// Axum server lifecycle: bind, serve, graceful shutdown
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::cors::CorsLayer;

use crate::{
    config::WebserverConfig,
    logger::{self, LogTag},
    webserver::{routes, state::AppState},
};

/// Bind the configured address; errors carry an operator-facing hint
pub async fn bind_listener(config: &WebserverConfig) -> Result<TcpListener, String> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid bind address: {}", e))?;

    TcpListener::bind(&addr).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::AddrInUse => format!(
            "Failed to bind to {}: Address already in use\n\
             \n\
             Another relay may already be running. Pick a different port with --port.",
            addr
        ),
        std::io::ErrorKind::PermissionDenied => format!(
            "Failed to bind to {}: Permission denied\n\
             \n\
             Port {} requires elevated privileges on this system.\n\
             Consider using a port above 1024.",
            addr, config.port
        ),
        _ => format!("Failed to bind to {}: {}", addr, e),
    })
}

/// Serve on an already bound listener
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
) -> Result<(), String> {
    if let Ok(addr) = listener.local_addr() {
        logger::info(
            LogTag::Webserver,
            &format!("Observers can connect at ws://{}/ws", addr),
        );
        logger::debug(
            LogTag::Webserver,
            &format!("Status endpoint at http://{}/api/status", addr),
        );
    }

    let shutdown_signal = async move {
        shutdown.notified().await;
        logger::debug(
            LogTag::Webserver,
            "Received shutdown signal, stopping webserver...",
        );
    };

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    logger::info(LogTag::Webserver, "Webserver stopped");
    Ok(())
}

/// Router with middleware
pub fn build_app(state: Arc<AppState>) -> Router {
    routes::create_router(state).layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RelayConfig, WebserverConfig};
    use crate::relay::testing::ScriptedConnector;
    use crate::relay::upstream::LinkEvent;
    use crate::relay::{ConnectionState, RelayService};
    use crate::services::implementations::RelayLifecycleService;
    use crate::services::{shared_service_manager, ServiceManager, SharedServiceManager};
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;

    const WAIT: Duration = Duration::from_secs(5);

    struct TestServer {
        addr: SocketAddr,
        relay: Arc<RelayService>,
        connector: Arc<ScriptedConnector>,
        services: SharedServiceManager,
        shutdown: Arc<Notify>,
    }

    async fn spawn_server() -> TestServer {
        let connector = ScriptedConnector::new();
        let relay = RelayService::new(&RelayConfig::default(), connector.clone()).unwrap();
        let services = shared_service_manager();
        let state = Arc::new(AppState::new(
            relay.clone(),
            WebserverConfig::default(),
            services.clone(),
        ));
        let shutdown = Arc::new(Notify::new());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state, shutdown.clone()));

        TestServer {
            addr,
            relay,
            connector,
            services,
            shutdown,
        }
    }

    async fn http(addr: SocketAddr, method: &str, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "{} {} HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            method, path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn json_body(response: &str) -> serde_json::Value {
        let body = response.split("\r\n\r\n").nth(1).unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_observer_socket_receives_state_and_messages() {
        let server = spawn_server().await;
        let url = format!("ws://{}/ws", server.addr);
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        let first = tokio::time::timeout(WAIT, socket.next()).await.unwrap().unwrap().unwrap();
        let first: serde_json::Value = serde_json::from_str(first.to_text().unwrap()).unwrap();
        assert_eq!(first["status"], "disconnected");

        socket
            .send(Message::Text(r#"{"type":"ping"}"#.to_string()))
            .await
            .unwrap();
        let pong = tokio::time::timeout(WAIT, socket.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(pong.to_text().unwrap(), r#"{"type":"pong"}"#);

        server.relay.start().await.unwrap();
        server.connector.emit_latest(LinkEvent::Connected);
        server.connector.emit_latest(LinkEvent::Message {
            topic: "/talker".to_string(),
            payload: "hello".to_string(),
        });

        let mut statuses = Vec::new();
        while statuses.len() < 2 {
            let frame = tokio::time::timeout(WAIT, socket.next()).await.unwrap().unwrap().unwrap();
            let json: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
            statuses.push((json["status"].clone(), json["message"].clone()));
        }
        assert_eq!(statuses[0].0, "connected");
        assert_eq!(statuses[1].0, "message");
        assert_eq!(statuses[1].1, "hello");

        socket.close(None).await.unwrap();
        server.shutdown.notify_one();
        server.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_status_and_admin_routes() {
        let server = spawn_server().await;

        let status = json_body(&http(server.addr, "GET", "/api/status").await);
        assert_eq!(status["relay"]["state"], "disconnected");
        assert_eq!(status["relay"]["max_retries"], 5);
        assert_eq!(status["relay"]["endpoint"], "ws://127.0.0.1:9090");

        let started = json_body(&http(server.addr, "POST", "/api/relay/start").await);
        assert_eq!(started["started"], true);
        assert_eq!(started["relay"]["state"], "connecting");

        let again = json_body(&http(server.addr, "POST", "/api/relay/start").await);
        assert_eq!(again["started"], false);

        let stopped = json_body(&http(server.addr, "POST", "/api/relay/stop").await);
        assert_eq!(stopped["relay"]["state"], "disconnected");
        assert!(
            server
                .relay
                .wait_for_state(ConnectionState::Disconnected, WAIT)
                .await
        );

        server.shutdown.notify_one();
        server.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_health_reports_service_states() {
        let server = spawn_server().await;

        let health = json_body(&http(server.addr, "GET", "/api/health").await);
        assert_eq!(health["status"], "starting");

        let mut manager = ServiceManager::new(Default::default());
        manager.register(Box::new(RelayLifecycleService::new(
            server.relay.clone(),
            false,
        )));
        *server.services.write().await = Some(manager);

        let health = json_body(&http(server.addr, "GET", "/api/health").await);
        assert_eq!(health["status"], "degraded");
        assert_eq!(health["services"]["relay"]["status"], "stopped");

        server.relay.start().await.unwrap();
        server.connector.emit_latest(LinkEvent::Connected);
        assert!(
            server
                .relay
                .wait_for_state(ConnectionState::Connected, WAIT)
                .await
        );

        let health = json_body(&http(server.addr, "GET", "/api/health").await);
        assert_eq!(health["status"], "ok");
        assert_eq!(health["services"]["relay"]["status"], "healthy");

        server.services.write().await.take();
        server.shutdown.notify_one();
        server.relay.shutdown().await;
    }
}
