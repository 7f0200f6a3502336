pub mod relay_service;
pub mod webserver_service;

pub use relay_service::RelayLifecycleService;
pub use webserver_service::WebserverService;
