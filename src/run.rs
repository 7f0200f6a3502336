// Process lifecycle on top of ServiceManager

use crate::{
    config::{get_config_clone, load_config},
    logger::{self, LogTag},
    relay::RelayService,
    services::{
        implementations::{RelayLifecycleService, WebserverService},
        shared_service_manager, ServiceManager,
    },
};

/// Load config, start the relay and webserver, run until a shutdown signal
pub async fn run_relay() -> Result<(), String> {
    logger::info(
        LogTag::System,
        &format!("rosrelay v{} starting up...", env!("CARGO_PKG_VERSION")),
    );

    load_config().map_err(|e| format!("Failed to load configuration: {}", e))?;
    let config = get_config_clone();

    let relay = RelayService::with_default_connector(&config.relay)
        .map_err(|e| format!("Failed to create relay: {}", e))?;

    let services = shared_service_manager();
    let mut manager = ServiceManager::new(config.clone());
    manager.register(Box::new(RelayLifecycleService::new(
        relay.clone(),
        config.relay.auto_start,
    )));
    manager.register(Box::new(WebserverService::new(
        relay,
        config.webserver.clone(),
        services.clone(),
    )));

    if let Err(e) = manager.start_all().await {
        logger::error(LogTag::System, &format!("Startup failed: {}", e));
        let _ = manager.stop_all().await;
        return Err(e);
    }

    *services.write().await = Some(manager);
    let waited = wait_for_shutdown_signal().await;

    // Take the manager back so stopping never holds the health lock
    let Some(mut manager) = services.write().await.take() else {
        return Err("Service manager missing at shutdown".to_string());
    };
    manager.stop_all().await?;
    waited?;
    logger::info(LogTag::System, "rosrelay stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<(), String> {
    logger::info(LogTag::System, "Waiting for shutdown signal (Ctrl+C)");

    #[cfg(unix)]
    let signal_name = {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint =
            signal(SignalKind::interrupt()).map_err(|e| format!("Failed to bind SIGINT: {}", e))?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| format!("Failed to bind SIGTERM: {}", e))?;

        tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        }
    };

    #[cfg(not(unix))]
    let signal_name = {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| format!("Failed to listen for shutdown signal: {}", e))?;
        "CTRL_C"
    };

    logger::warning(
        LogTag::System,
        &format!("Shutdown signal received ({}), stopping...", signal_name),
    );

    // A second Ctrl+C during graceful shutdown exits immediately
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            logger::error(LogTag::System, "Second Ctrl+C detected, forcing exit.");
            logger::flush();
            std::process::exit(130);
        }
    });

    Ok(())
}
