mod health;
pub mod implementations;

pub use health::{overall_status, ServiceHealth};

use crate::config::Config;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;

/// Slot holding the running manager, read by the health route
///
/// `run` installs the manager once startup finished and takes it back
/// before shutdown, so the lock is never held across start or stop.
pub type SharedServiceManager = Arc<RwLock<Option<ServiceManager>>>;

pub fn shared_service_manager() -> SharedServiceManager {
    Arc::new(RwLock::new(None))
}

/// Health of every registered service, empty until a manager is installed
pub async fn get_services_health(
    slot: &SharedServiceManager,
) -> HashMap<&'static str, ServiceHealth> {
    match slot.read().await.as_ref() {
        Some(manager) => manager.get_health().await,
        None => HashMap::new(),
    }
}

/// Core service trait that all services must implement
#[async_trait]
pub trait Service: Send + Sync {
    /// Unique service identifier
    fn name(&self) -> &'static str;

    /// Service priority (lower = starts earlier, stops later)
    fn priority(&self) -> i32 {
        100
    }

    /// Services this service depends on
    fn dependencies(&self) -> Vec<&'static str> {
        vec![]
    }

    fn is_enabled(&self, _config: &Config) -> bool {
        true
    }

    async fn initialize(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Start the service; returned handles are awaited on shutdown
    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String>;

    async fn stop(&mut self) -> Result<(), String> {
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        ServiceHealth::Healthy
    }
}

pub struct ServiceManager {
    services: HashMap<&'static str, Box<dyn Service>>,
    handles: HashMap<&'static str, Vec<JoinHandle<()>>>,
    shutdown: Arc<Notify>,
    config: Config,
}

impl ServiceManager {
    pub fn new(config: Config) -> Self {
        Self {
            services: HashMap::new(),
            handles: HashMap::new(),
            shutdown: Arc::new(Notify::new()),
            config,
        }
    }

    pub fn register(&mut self, service: Box<dyn Service>) {
        let name = service.name();
        self.services.insert(name, service);
    }

    /// Start all enabled services in dependency and priority order
    pub async fn start_all(&mut self) -> Result<(), String> {
        logger::info(LogTag::System, "Starting all services...");

        let enabled_services: Vec<&'static str> = self
            .services
            .iter()
            .filter(|(_, service)| service.is_enabled(&self.config))
            .map(|(name, _)| *name)
            .collect();

        let ordered = self.resolve_startup_order(&enabled_services)?;

        logger::debug(
            LogTag::System,
            &format!("Service startup order: {:?}", ordered),
        );

        for service_name in ordered {
            if let Some(service) = self.services.get_mut(service_name) {
                service.initialize().await?;

                let handles = service.start(self.shutdown.clone()).await?;
                self.handles.insert(service_name, handles);

                logger::info(
                    LogTag::System,
                    &format!("Service started: {}", service_name),
                );
            }
        }

        logger::info(LogTag::System, "All services started");
        Ok(())
    }

    /// Stop all started services in reverse startup order
    pub async fn stop_all(&mut self) -> Result<(), String> {
        logger::info(LogTag::System, "Stopping all services...");

        self.shutdown.notify_waiters();

        let running_services: Vec<&'static str> = self.handles.keys().copied().collect();
        let mut ordered = self.resolve_startup_order(&running_services)?;
        ordered.reverse();

        for service_name in ordered {
            if let Some(service) = self.services.get_mut(service_name) {
                if let Err(e) = service.stop().await {
                    logger::warning(
                        LogTag::System,
                        &format!("Service stop error for {}: {}", service_name, e),
                    );
                }

                if let Some(handles) = self.handles.remove(service_name) {
                    for handle in handles {
                        if tokio::time::timeout(tokio::time::Duration::from_secs(5), handle)
                            .await
                            .is_err()
                        {
                            logger::warning(
                                LogTag::System,
                                &format!("Service {} did not stop within 5s", service_name),
                            );
                        }
                    }
                }

                logger::info(
                    LogTag::System,
                    &format!("Service stopped: {}", service_name),
                );
            }
        }

        logger::info(LogTag::System, "All services stopped");
        Ok(())
    }

    /// Dependencies first; ties broken by priority
    fn resolve_startup_order(
        &self,
        services: &[&'static str],
    ) -> Result<Vec<&'static str>, String> {
        use std::collections::HashSet;

        let mut ordered = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        fn visit(
            name: &'static str,
            services: &HashMap<&'static str, Box<dyn Service>>,
            ordered: &mut Vec<&'static str>,
            visited: &mut HashSet<&'static str>,
            visiting: &mut HashSet<&'static str>,
        ) -> Result<(), String> {
            if visited.contains(name) {
                return Ok(());
            }

            if visiting.contains(name) {
                return Err(format!(
                    "Circular dependency detected for service: {}",
                    name
                ));
            }

            let service = services
                .get(name)
                .ok_or_else(|| format!("Unknown service dependency: {}", name))?;

            visiting.insert(name);
            for dep in service.dependencies() {
                visit(dep, services, ordered, visited, visiting)?;
            }
            visiting.remove(name);

            visited.insert(name);
            ordered.push(name);
            Ok(())
        }

        let mut roots = services.to_vec();
        roots.sort_by_key(|name| self.services.get(name).map(|s| s.priority()).unwrap_or(100));

        for service_name in roots {
            visit(
                service_name,
                &self.services,
                &mut ordered,
                &mut visited,
                &mut visiting,
            )?;
        }

        Ok(ordered)
    }

    pub async fn get_health(&self) -> HashMap<&'static str, ServiceHealth> {
        let mut health = HashMap::new();
        for (name, service) in &self.services {
            health.insert(*name, service.health().await);
        }
        health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct MockService {
        name: &'static str,
        priority: i32,
        deps: Vec<&'static str>,
        journal: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Service for MockService {
        fn name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn dependencies(&self) -> Vec<&'static str> {
            self.deps.clone()
        }

        async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
            self.journal.lock().push(format!("start:{}", self.name));
            let handle = tokio::spawn(async move {
                shutdown.notified().await;
            });
            Ok(vec![handle])
        }

        async fn stop(&mut self) -> Result<(), String> {
            self.journal.lock().push(format!("stop:{}", self.name));
            Ok(())
        }
    }

    fn mock(
        name: &'static str,
        priority: i32,
        deps: Vec<&'static str>,
        journal: &Arc<Mutex<Vec<String>>>,
    ) -> Box<dyn Service> {
        Box::new(MockService {
            name,
            priority,
            deps,
            journal: journal.clone(),
        })
    }

    #[tokio::test]
    async fn test_start_and_stop_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ServiceManager::new(Config::default());
        manager.register(mock("webserver", 30, vec!["relay"], &journal));
        manager.register(mock("relay", 10, vec![], &journal));

        manager.start_all().await.unwrap();
        tokio::task::yield_now().await;
        manager.stop_all().await.unwrap();

        assert_eq!(
            *journal.lock(),
            vec![
                "start:relay",
                "start:webserver",
                "stop:webserver",
                "stop:relay"
            ]
        );
    }

    #[tokio::test]
    async fn test_dependency_beats_priority() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ServiceManager::new(Config::default());
        manager.register(mock("early", 1, vec!["late"], &journal));
        manager.register(mock("late", 50, vec![], &journal));

        let order = manager.resolve_startup_order(&["early", "late"]).unwrap();
        assert_eq!(order, vec!["late", "early"]);
    }

    #[tokio::test]
    async fn test_services_health_through_slot() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let slot = shared_service_manager();
        assert!(get_services_health(&slot).await.is_empty());

        let mut manager = ServiceManager::new(Config::default());
        manager.register(mock("relay", 10, vec![], &journal));
        manager.register(mock("webserver", 30, vec!["relay"], &journal));
        *slot.write().await = Some(manager);

        let health = get_services_health(&slot).await;
        assert_eq!(health.len(), 2);
        assert!(health.values().all(ServiceHealth::is_healthy));

        let manager = slot.write().await.take();
        assert!(manager.is_some());
        assert!(get_services_health(&slot).await.is_empty());
    }

    #[tokio::test]
    async fn test_circular_dependency_rejected() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ServiceManager::new(Config::default());
        manager.register(mock("a", 10, vec!["b"], &journal));
        manager.register(mock("b", 10, vec!["a"], &journal));

        let err = manager.start_all().await.unwrap_err();
        assert!(err.contains("Circular dependency"));
        assert!(journal.lock().is_empty());
    }
}
