pub mod arguments;
pub mod config;
pub mod errors;
pub mod logger;
pub mod relay;
pub mod run;
pub mod services;
pub mod webserver;
